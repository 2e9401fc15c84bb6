use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Remote {
    pub name: String,
    pub url: String,
}

impl Remote {
    pub fn new(name: impl AsRef<str>, url: impl AsRef<str>) -> Remote {
        Remote {
            name: name.as_ref().to_string(),
            url: url.as_ref().to_string(),
        }
    }
}
