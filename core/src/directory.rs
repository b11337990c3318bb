/// Collaborators outside the engine: the local identity and the
/// connections directory consulted when starting a conversation
use crate::messenger_types::Participant;
use serde::{Deserialize, Serialize};

/// The signed-in user; decides authorship and self-read semantics
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalUser {
    pub id: String,
    pub display_name: String,
}

impl LocalUser {
    pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
        }
    }
}

/// Read-only lookup of people the local user is connected to
pub trait ConnectionsDirectory: Send + Sync {
    fn find(&self, participant_id: &str) -> Option<Participant>;
}

/// Directory over a fixed list of descriptors
#[derive(Debug, Clone, Default)]
pub struct StaticDirectory {
    participants: Vec<Participant>,
}

impl StaticDirectory {
    pub fn new(participants: Vec<Participant>) -> Self {
        Self { participants }
    }
}

impl ConnectionsDirectory for StaticDirectory {
    fn find(&self, participant_id: &str) -> Option<Participant> {
        self.participants
            .iter()
            .find(|p| p.id == participant_id)
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn participant(id: &str) -> Participant {
        Participant {
            id: id.to_string(),
            display_name: format!("User {}", id),
            title: "Engineer".to_string(),
            avatar: String::new(),
            online: false,
        }
    }

    #[test]
    fn test_static_directory_lookup() {
        let dir = StaticDirectory::new(vec![participant("usr_1"), participant("usr_2")]);
        assert_eq!(dir.find("usr_2").map(|p| p.id), Some("usr_2".to_string()));
        assert!(dir.find("usr_unknown").is_none());
    }
}
