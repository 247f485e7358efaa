use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver};
use mb_api::{spawn_session, Input, OutputBatch, Session};
use mb_core::{ErrorKind, KeyMessage, Keybind, Modifiers, Object, ObjectId, ObjectType::*};

const ALICE: ObjectId = ObjectId(10);
const BOB: ObjectId = ObjectId(11);
const CAROL: ObjectId = ObjectId(12);

fn session() -> Session {
    Session {
        objects: vec![
            Object::new(1, Profile, None, "Main"),
            Object::new(2, Account, Some(1), "Acct"),
            Object::new(10, Character, Some(2), "Alice").with_value(
                "mbox::SendKeyPress(Me, 0x30);\n\
                 mbox::OnKeyDown(0x41, || mbox::SendKeyPress(mbox::Others(), 0x31));",
            ),
            Object::new(11, Character, Some(2), "Bob"),
            Object::new(12, Character, Some(2), "Carol"),
            Object::new(30, Party, Some(1), "Duo")
                .with_value("mbox::AddCharacter(Alice, 1);\nmbox::AddCharacter(Bob, 2);")
                .with_ref("Alice", 10)
                .with_ref("Bob", 11)
                .with_ref("Carol", 12),
        ],
        macro_pool: vec![Keybind::new(0x70, Modifiers::CONTROL)],
        party: ObjectId(30),
        limits: None,
    }
}

fn next(receiver: &Receiver<OutputBatch>) -> OutputBatch {
    receiver
        .recv_timeout(Duration::from_secs(5))
        .expect("batch should arrive")
}

#[test]
fn worker_emits_assembly_output_then_processes_posts() {
    let (sender, receiver) = unbounded();
    let handle = spawn_session(&session(), Arc::new(sender)).expect("spawn");
    assert_eq!(handle.report().characters.len(), 2);

    let assembly = next(&receiver);
    assert_eq!(assembly.character, ALICE);
    assert_eq!(assembly.messages, vec![KeyMessage::Down(0x30), KeyMessage::Up(0x30)]);

    let press = Input::KeyPress {
        key: 0x41,
        modifiers: Modifiers::empty(),
    };
    handle.post(BOB, press).expect("post");
    handle.post(ALICE, press).expect("post");
    for _ in 0..2 {
        let batch = next(&receiver);
        assert_eq!(batch.character, BOB);
        assert_eq!(batch.messages, vec![KeyMessage::Down(0x31), KeyMessage::Up(0x31)]);
    }

    handle.cancel();
    let error = handle.post(ALICE, press).expect_err("stopped");
    assert_eq!(error.kind, ErrorKind::EngineStopped);
    handle.join().expect("join");
}

#[test]
fn posts_for_unslotted_characters_are_refused() {
    let (sender, _receiver) = unbounded();
    let handle = spawn_session(&session(), Arc::new(sender)).expect("spawn");
    let error = handle
        .post(CAROL, Input::Other)
        .expect_err("carol is not slotted");
    assert_eq!(error.kind, ErrorKind::CharacterNotAssembled);
}

#[test]
fn assembly_errors_come_back_from_spawn() {
    let mut session = session();
    session.objects[2] = session.objects[2].clone().with_value("mbox::Nope();");
    let (sender, _receiver) = unbounded();
    let error = spawn_session(&session, Arc::new(sender))
        .err()
        .expect("assembly should fail");
    assert!(
        matches!(error.kind, ErrorKind::ScriptRuntime | ErrorKind::ScriptCompile),
        "{}",
        error
    );
}
