use std::collections::BTreeMap;

use mb_core::{KeyCode, KeyMessage, Modifiers, ObjectId, SendAction};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendRequest {
    pub character: ObjectId,
    pub action: SendAction,
    pub key: KeyCode,
    pub modifiers: Modifiers,
}

impl SendRequest {
    pub fn new(character: ObjectId, action: SendAction, key: KeyCode, modifiers: Modifiers) -> Self {
        Self {
            character,
            action,
            key,
            modifiers,
        }
    }

    fn same_key(&self, other: &SendRequest) -> bool {
        self.key == other.key && self.modifiers == other.modifiers
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputBatch {
    pub character: ObjectId,
    pub messages: Vec<KeyMessage>,
}

pub fn build_batches(requests: &[SendRequest]) -> Vec<OutputBatch> {
    let mut per_character: BTreeMap<ObjectId, Vec<SendRequest>> = BTreeMap::new();
    for request in requests {
        per_character
            .entry(request.character)
            .or_default()
            .push(*request);
    }

    per_character
        .into_iter()
        .filter_map(|(character, requests)| {
            let messages = expand(&collapse(&split(&requests)));
            if messages.is_empty() {
                None
            } else {
                Some(OutputBatch {
                    character,
                    messages,
                })
            }
        })
        .collect()
}

fn split(requests: &[SendRequest]) -> Vec<SendRequest> {
    let mut out = Vec::with_capacity(requests.len() * 2);
    for request in requests {
        match request.action {
            SendAction::PressThenRelease => {
                out.push(SendRequest {
                    action: SendAction::Press,
                    ..*request
                });
                out.push(SendRequest {
                    action: SendAction::Release,
                    ..*request
                });
            }
            _ => out.push(*request),
        }
    }
    out
}

// Drops every `release(K)` that is directly followed by `press(K)` with the
// same modifiers. Pairs removed earlier count as no-ops, so nested toggles
// collapse as well.
fn collapse(requests: &[SendRequest]) -> Vec<SendRequest> {
    let mut kept: Vec<SendRequest> = Vec::with_capacity(requests.len());
    for request in requests {
        let cancels = request.action == SendAction::Press
            && kept.last().is_some_and(|last| {
                last.action == SendAction::Release && last.same_key(request)
            });
        if cancels {
            kept.pop();
        } else {
            kept.push(*request);
        }
    }
    kept
}

fn expand(requests: &[SendRequest]) -> Vec<KeyMessage> {
    let mut messages = Vec::new();
    for request in requests {
        let modifiers = request.modifiers.key_codes();
        match request.action {
            SendAction::Press => {
                messages.extend(modifiers.iter().map(|key| KeyMessage::Down(*key)));
                messages.push(KeyMessage::Down(request.key));
            }
            SendAction::Release => {
                messages.push(KeyMessage::Up(request.key));
                messages.extend(modifiers.iter().rev().map(|key| KeyMessage::Up(*key)));
            }
            SendAction::PressThenRelease => {
                messages.extend(modifiers.iter().map(|key| KeyMessage::Down(*key)));
                messages.push(KeyMessage::Down(request.key));
                messages.push(KeyMessage::Up(request.key));
                messages.extend(modifiers.iter().rev().map(|key| KeyMessage::Up(*key)));
            }
        }
    }
    messages
}

#[cfg(test)]
mod batch_tests {
    use super::*;
    use mb_core::{VK_ALT, VK_CONTROL, VK_SHIFT};
    use KeyMessage::{Down, Up};

    const ALICE: ObjectId = ObjectId(10);
    const BOB: ObjectId = ObjectId(11);

    fn request(character: ObjectId, action: SendAction, key: KeyCode, mods: Modifiers) -> SendRequest {
        SendRequest::new(character, action, key, mods)
    }

    #[test]
    fn modifiers_bracket_the_primary_key() {
        let batches = build_batches(&[request(
            ALICE,
            SendAction::PressThenRelease,
            0x31,
            Modifiers::SHIFT | Modifiers::ALT,
        )]);
        assert_eq!(
            batches,
            vec![OutputBatch {
                character: ALICE,
                messages: vec![
                    Down(VK_SHIFT),
                    Down(VK_ALT),
                    Down(0x31),
                    Up(0x31),
                    Up(VK_ALT),
                    Up(VK_SHIFT),
                ],
            }]
        );
    }

    #[test]
    fn release_then_press_of_the_same_key_collapses() {
        let mods = Modifiers::CONTROL;
        let batches = build_batches(&[
            request(ALICE, SendAction::Press, 0x31, mods),
            request(ALICE, SendAction::Release, 0x31, mods),
            request(ALICE, SendAction::Press, 0x31, mods),
            request(ALICE, SendAction::Release, 0x31, mods),
        ]);
        assert_eq!(
            batches[0].messages,
            vec![Down(VK_CONTROL), Down(0x31), Up(0x31), Up(VK_CONTROL)]
        );
    }

    #[test]
    fn different_modifiers_do_not_collapse() {
        let batches = build_batches(&[
            request(ALICE, SendAction::Release, 0x31, Modifiers::empty()),
            request(ALICE, SendAction::Press, 0x31, Modifiers::SHIFT),
        ]);
        assert_eq!(
            batches[0].messages,
            vec![Up(0x31), Down(VK_SHIFT), Down(0x31)]
        );
    }

    #[test]
    fn collapsed_pairs_are_skipped_as_no_ops() {
        let plain = Modifiers::empty();
        // release A, release B, press B, press A: the inner pair goes first,
        // which leaves release A adjacent to press A.
        let batches = build_batches(&[
            request(ALICE, SendAction::Release, 0x41, plain),
            request(ALICE, SendAction::Release, 0x42, plain),
            request(ALICE, SendAction::Press, 0x42, plain),
            request(ALICE, SendAction::Press, 0x41, plain),
        ]);
        assert!(batches.is_empty());
    }

    #[test]
    fn batches_are_split_per_character_in_id_order() {
        let plain = Modifiers::empty();
        let batches = build_batches(&[
            request(BOB, SendAction::PressThenRelease, 0x32, plain),
            request(ALICE, SendAction::PressThenRelease, 0x31, plain),
            request(BOB, SendAction::Press, 0x33, plain),
        ]);
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].character, ALICE);
        assert_eq!(batches[0].messages, vec![Down(0x31), Up(0x31)]);
        assert_eq!(batches[1].character, BOB);
        assert_eq!(
            batches[1].messages,
            vec![Down(0x32), Up(0x32), Down(0x33)]
        );
    }
}
