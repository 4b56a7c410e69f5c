use crate::types::TrackerError;

#[derive(Debug, Clone, PartialEq, Eq)]
/// An `owner/name` repository reference.
pub struct RepoRef {
    pub owner: String,
    pub name: String,
}

impl RepoRef {
    pub fn parse(raw: &str) -> Result<Self, TrackerError> {
        let trimmed = raw.trim();
        let (owner, name) = trimmed.split_once('/').ok_or_else(|| {
            TrackerError::InvalidConfig(format!("invalid repository '{raw}', expected owner/repo"))
        })?;
        let owner = owner.trim();
        let name = name.trim();
        if owner.is_empty() || name.is_empty() || name.contains('/') {
            return Err(TrackerError::InvalidConfig(format!(
                "invalid repository '{raw}', expected owner/repo"
            )));
        }
        Ok(Self {
            owner: owner.to_string(),
            name: name.to_string(),
        })
    }

    pub fn as_slug(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}
