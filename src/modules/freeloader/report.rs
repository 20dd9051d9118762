use serenity::all::{GuildId, UserId};

use super::core::Directory;

/// The freeloader set for one finished campaign plus its rendered report.
/// Ephemeral; lives only for the stop -> confirm -> ban workflow.
pub struct FreeloaderReport {
    pub freeloaders: Vec<UserId>,
    pub text: String,
}

impl FreeloaderReport {
    pub fn is_empty(&self) -> bool {
        self.freeloaders.is_empty()
    }
}

/// Classifies every triggered member that is no longer in the guild as a
/// freeloader. Requires a full membership materialization, which the
/// directory performs up front. An empty result is success, not an error.
pub async fn build_report(
    directory: &dyn Directory,
    guild_id: GuildId,
    triggered: &[UserId],
) -> Result<FreeloaderReport, crate::Error> {
    let members = directory.sync_members(guild_id).await?;

    let mut freeloaders = Vec::new();
    let mut text = String::new();

    for &user_id in triggered {
        if members.contains(&user_id) {
            continue;
        }

        let name = directory.display_name(user_id).await;

        text.push_str(&format!("{} ({})\n", name, user_id));
        freeloaders.push(user_id);
    }

    Ok(FreeloaderReport { freeloaders, text })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::{HashMap, HashSet};

    struct FakeDirectory {
        members: HashSet<UserId>,
        names: HashMap<UserId, String>,
    }

    #[async_trait]
    impl Directory for FakeDirectory {
        async fn sync_members(&self, _guild_id: GuildId) -> Result<HashSet<UserId>, crate::Error> {
            Ok(self.members.clone())
        }

        async fn display_name(&self, user_id: UserId) -> String {
            self.names
                .get(&user_id)
                .cloned()
                .unwrap_or_else(|| user_id.to_string())
        }
    }

    fn uid(n: u64) -> UserId {
        UserId::new(n)
    }

    #[tokio::test]
    async fn leavers_are_classified_and_stayers_are_not() {
        let directory = FakeDirectory {
            members: [uid(1), uid(2)].into_iter().collect(),
            names: [(uid(3), "ghost".to_string())].into_iter().collect(),
        };

        // 2 triggered and stayed, 3 triggered and left
        let report = build_report(&directory, GuildId::new(1), &[uid(2), uid(3)])
            .await
            .unwrap();

        assert_eq!(report.freeloaders, vec![uid(3)]);
        assert_eq!(report.text, "ghost (3)\n");
    }

    #[tokio::test]
    async fn unresolvable_ids_fall_back_to_the_bare_id() {
        let directory = FakeDirectory {
            members: HashSet::new(),
            names: HashMap::new(),
        };

        let report = build_report(&directory, GuildId::new(1), &[uid(42)])
            .await
            .unwrap();

        assert_eq!(report.text, "42 (42)\n");
    }

    #[tokio::test]
    async fn no_freeloaders_is_an_empty_success() {
        let directory = FakeDirectory {
            members: [uid(2)].into_iter().collect(),
            names: HashMap::new(),
        };

        let report = build_report(&directory, GuildId::new(1), &[uid(2)])
            .await
            .unwrap();

        assert!(report.is_empty());
        assert!(report.text.is_empty());
    }
}
