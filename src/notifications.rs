use uuid::Uuid;

use crate::errors::Result;
use crate::models::{Actor, NewNotification};
use crate::store::Store;

pub const SMACK_TALK_KIND: &str = "smack_talk";

const SMACK_TALK_TEMPLATES: &[&str] = &[
    "@{name} just checked in AGAIN… you gonna let them outdrink you? 💀",
    "yo @{name} is on a TEAR today. what's your excuse? 🫠",
    "@{name} just logged another one. at this point they're carrying your whole campus 😤",
    "@{name} is putting in WORK rn and you're just watching?? 👀",
    "not @{name} casually flexing another check-in while you sit there dry 🏜️",
    "@{name} really said \"I never miss\" and they meant it. your move 🎯",
    "@{name} just checked in. that's more than you've done all week bestie 💅",
    "imagine letting @{name} have more check-ins than you. couldn't be me 😭",
    "@{name} is speedrunning check-ins today and you're AFK 🎮",
    "@{name} just hit another one. they're not even trying and still winning 🏆",
    "the way @{name} keeps checking in is actually embarrassing… for YOU 🪞",
    "@{name} woke up and chose violence (caffeine violence) ☕🔥",
    "@{name} just posted AGAIN. do you even drink bro?? 🤨",
    "@{name} really treating check-ins like a full-time job rn 💼",
    "@{name} has been LOCKED IN today. meanwhile you've been locked out 🔒",
    "another day, another @{name} check-in. and another day of you doing nothing 📉",
    "@{name} is building a dynasty and you're building excuses 🧱",
    "@{name} just dropped another check-in like it's nothing. go touch a drink 🥤",
    "breaking: @{name} still has more check-ins than you. developing story 📰",
    "@{name} really out here collecting check-ins like infinity stones 💎",
];

/// Uniform value in `[0, 1)` from the low 53 bits of a v4 UUID.
///
/// A v4 UUID carries 122 bits from the OS random source; only the version
/// nibble and the variant bits are fixed, and both sit above bit 53. The
/// crate already depends on `uuid` with `v4`, so no separate RNG crate is
/// pulled in for this one coin flip.
fn roll() -> f64 {
    const MANTISSA: u64 = 1 << 53;
    let bits = Uuid::new_v4().as_u128() as u64 & (MANTISSA - 1);
    bits as f64 / MANTISSA as f64
}

pub fn smack_talk_message(template_index: usize, poster_name: &str) -> String {
    SMACK_TALK_TEMPLATES[template_index % SMACK_TALK_TEMPLATES.len()].replace("{name}", poster_name)
}

/// Builds one notification per follower, all carrying the same message.
pub fn smack_talk_batch(poster_id: Uuid, message: &str, followers: &[Uuid]) -> Vec<NewNotification> {
    followers
        .iter()
        .filter(|follower| **follower != poster_id)
        .map(|follower| NewNotification {
            actor_id: *follower,
            from_actor_id: Some(poster_id),
            message: message.to_string(),
            kind: SMACK_TALK_KIND.to_string(),
        })
        .collect()
}

/// With probability `chance`, taunts every follower of `poster` about their
/// new check-in. Returns how many notifications were written.
pub async fn maybe_smack_talk(store: &dyn Store, poster: &Actor, chance: f64) -> Result<usize> {
    if roll() >= chance {
        return Ok(0);
    }

    let followers = store.follower_ids(poster.id).await?;
    if followers.is_empty() {
        return Ok(0);
    }

    let index = (roll() * SMACK_TALK_TEMPLATES.len() as f64) as usize;
    let message = smack_talk_message(index, &poster.username);
    let sent = store
        .insert_notifications(smack_talk_batch(poster.id, &message, &followers))
        .await?;

    tracing::info!(poster = %poster.id, sent, "📣 Smack talk sent");
    Ok(sent)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewActor;
    use crate::store::MemoryStore;

    #[test]
    fn roll_stays_in_unit_interval() {
        for _ in 0..1000 {
            let r = roll();
            assert!((0.0..1.0).contains(&r));
        }
    }

    #[test]
    fn roll_covers_both_halves() {
        let rolls: Vec<f64> = (0..200).map(|_| roll()).collect();
        assert!(rolls.iter().any(|r| *r < 0.5));
        assert!(rolls.iter().any(|r| *r >= 0.5));
    }

    #[test]
    fn message_substitutes_every_name() {
        let message = smack_talk_message(0, "ana");
        assert!(message.starts_with("@ana just checked in"));
        assert!(!message.contains("{name}"));
        assert_eq!(smack_talk_message(SMACK_TALK_TEMPLATES.len(), "ana"), message);
    }

    #[tokio::test]
    async fn certain_roll_reaches_all_followers() {
        let store = MemoryStore::new();
        let mut actors = Vec::new();
        for name in ["poster", "fan1", "fan2"] {
            actors.push(
                store
                    .create_actor(NewActor {
                        username: name.to_string(),
                        display_name: None,
                        campus: None,
                        city: None,
                        avatar_url: None,
                    })
                    .await
                    .unwrap(),
            );
        }
        let poster = &actors[0];
        for fan in &actors[1..] {
            store.follow(fan.id, poster.id).await.unwrap();
        }

        assert_eq!(maybe_smack_talk(&store, poster, 0.0).await.unwrap(), 0);
        assert_eq!(maybe_smack_talk(&store, poster, 1.0).await.unwrap(), 2);

        let inbox = store.list_notifications(actors[1].id, 10).await.unwrap();
        assert_eq!(inbox.len(), 1);
        assert_eq!(inbox[0].kind, SMACK_TALK_KIND);
        assert!(inbox[0].message.contains("@poster"));
    }
}
