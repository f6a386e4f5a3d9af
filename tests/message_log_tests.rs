// Tests for the message log and its single-streaming-message invariant

use loqa_console::conversation::{
    LogEvent, MessageLog, MessageStatus, NewMessage, Role, Segments,
};
use loqa_console::ConsoleError;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn answer(text: &str) -> Segments {
    Segments {
        reasoning: String::new(),
        answer: text.to_string(),
        is_partial: false,
    }
}

#[test]
fn test_append_assigns_increasing_indices() {
    let mut log = MessageLog::new();

    assert_eq!(log.append(NewMessage::user("hello")).unwrap(), 0);
    assert_eq!(log.append(NewMessage::code("fn main() {}")).unwrap(), 1);
    assert_eq!(log.append(NewMessage::user("again")).unwrap(), 2);

    let messages = log.messages();
    assert_eq!(messages.len(), 3);
    assert_eq!(messages[1].role, Role::Code);
    assert!(messages[0].created_at <= messages[2].created_at);
}

#[test]
fn test_second_streaming_message_rejected() {
    let mut log = MessageLog::new();
    log.append(NewMessage::user("hi")).unwrap();
    log.append(NewMessage::streaming_assistant()).unwrap();

    let err = log.append(NewMessage::streaming_assistant()).unwrap_err();
    assert!(matches!(err, ConsoleError::InvalidState(_)));
    assert_eq!(log.len(), 2);
}

#[test]
fn test_append_behind_streaming_message_rejected() {
    let mut log = MessageLog::new();
    log.append(NewMessage::streaming_assistant()).unwrap();

    let err = log.append(NewMessage::user("interrupt")).unwrap_err();
    assert!(matches!(err, ConsoleError::InvalidState(_)));
    assert!(log.last().unwrap().is_streaming(), "Streaming message must stay at the tail");
}

#[test]
fn test_only_assistant_messages_stream() {
    let mut log = MessageLog::new();

    let err = log
        .append(NewMessage {
            role: Role::User,
            text: "hi".to_string(),
            status: MessageStatus::Streaming,
        })
        .unwrap_err();

    assert!(matches!(err, ConsoleError::InvalidState(_)));
    assert!(log.is_empty());
}

#[test]
fn test_update_streaming_changes_tail() {
    let mut log = MessageLog::new();
    log.append(NewMessage::user("hi")).unwrap();
    log.append(NewMessage::streaming_assistant()).unwrap();

    let segments = Segments {
        reasoning: "greeting".to_string(),
        answer: String::new(),
        is_partial: true,
    };
    log.update_streaming(&segments, MessageStatus::Streaming).unwrap();

    let tail = log.last().unwrap();
    assert_eq!(tail.reasoning, "greeting");
    assert!(tail.thinking);

    log.update_streaming(&answer("Hello!"), MessageStatus::Streaming).unwrap();
    let tail = log.last().unwrap();
    assert_eq!(tail.text, "Hello!");
    assert!(!tail.thinking);
}

#[test]
fn test_update_without_streaming_tail_rejected() {
    let mut log = MessageLog::new();

    let err = log.update_streaming(&answer("x"), MessageStatus::Streaming).unwrap_err();
    assert!(matches!(err, ConsoleError::InvalidState(_)));

    log.append(NewMessage::user("hi")).unwrap();
    let err = log.update_streaming(&answer("x"), MessageStatus::Streaming).unwrap_err();
    assert!(matches!(err, ConsoleError::InvalidState(_)));
    assert_eq!(log.last().unwrap().text, "hi");
}

#[test]
fn test_finalize_is_tolerant_of_duplicates() {
    let mut log = MessageLog::new();
    log.append(NewMessage::streaming_assistant()).unwrap();

    assert!(log.finalize(MessageStatus::Complete).unwrap());
    assert!(!log.finalize(MessageStatus::Complete).unwrap());
    assert!(!log.finalize(MessageStatus::Cancelled).unwrap());

    assert_eq!(log.last().unwrap().status, MessageStatus::Complete);
}

#[test]
fn test_finalize_requires_terminal_status() {
    let mut log = MessageLog::new();
    log.append(NewMessage::streaming_assistant()).unwrap();

    assert!(log.finalize(MessageStatus::Streaming).is_err());
    assert!(log.finalize(MessageStatus::Pending).is_err());
    assert!(log.streaming().is_some());
}

#[test]
fn test_clear_mid_stream_cancels_and_resets_indices() {
    let mut log = MessageLog::new();
    let mut events = log.subscribe();

    log.append(NewMessage::user("hi")).unwrap();
    log.append(NewMessage::streaming_assistant()).unwrap();
    log.clear();

    assert!(log.is_empty());
    assert_eq!(log.append(NewMessage::user("fresh start")).unwrap(), 0);

    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        seen.push(event);
    }

    assert!(matches!(seen[0], LogEvent::Appended { .. }));
    assert!(matches!(seen[1], LogEvent::Appended { .. }));
    assert_eq!(
        seen[2],
        LogEvent::Finalized {
            index: 1,
            status: MessageStatus::Cancelled
        }
    );
    assert_eq!(seen[3], LogEvent::Cleared);
    assert!(matches!(seen[4], LogEvent::Appended { ref message } if message.index == 0));
}

#[test]
fn test_every_mutation_is_notified() {
    let mut log = MessageLog::new();
    let mut events = log.subscribe();

    log.append(NewMessage::streaming_assistant()).unwrap();
    log.update_streaming(&answer("partial"), MessageStatus::Streaming).unwrap();
    log.finalize(MessageStatus::Complete).unwrap();

    match events.try_recv().unwrap() {
        LogEvent::Appended { message } => assert_eq!(message.status, MessageStatus::Streaming),
        other => panic!("Expected Appended, got {:?}", other),
    }
    match events.try_recv().unwrap() {
        LogEvent::Updated { message } => assert_eq!(message.text, "partial"),
        other => panic!("Expected Updated, got {:?}", other),
    }
    assert_eq!(
        events.try_recv().unwrap(),
        LogEvent::Finalized {
            index: 0,
            status: MessageStatus::Complete
        }
    );
    assert!(events.try_recv().is_err());
}

#[test]
fn test_mutations_without_subscribers_succeed() {
    let mut log = MessageLog::new();
    drop(log.subscribe());

    log.append(NewMessage::user("nobody is watching")).unwrap();
    assert_eq!(log.len(), 1);
}

#[test]
fn test_random_operations_never_break_streaming_invariant() {
    let statuses = [
        MessageStatus::Pending,
        MessageStatus::Streaming,
        MessageStatus::Complete,
        MessageStatus::Cancelled,
        MessageStatus::Errored,
    ];
    let roles = [Role::User, Role::Assistant, Role::Code];

    for seed in 0..50u64 {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut log = MessageLog::new();

        for _ in 0..200 {
            let status = statuses[rng.gen_range(0..statuses.len())];
            let streaming_before = log.streaming().is_some();

            match rng.gen_range(0..4) {
                0 => {
                    let role = roles[rng.gen_range(0..roles.len())];
                    let result = log.append(NewMessage {
                        role,
                        text: "t".to_string(),
                        status,
                    });
                    let violating = streaming_before
                        || (status == MessageStatus::Streaming && role != Role::Assistant);
                    assert_eq!(result.is_err(), violating, "seed {}", seed);
                }
                1 => {
                    let result = log.update_streaming(&answer("u"), status);
                    assert_eq!(result.is_err(), !streaming_before, "seed {}", seed);
                }
                2 => {
                    let result = log.finalize(status);
                    if status.is_terminal() {
                        assert_eq!(result.unwrap(), streaming_before, "seed {}", seed);
                    } else {
                        assert!(result.is_err(), "seed {}", seed);
                    }
                }
                _ => {
                    if rng.gen_bool(0.05) {
                        log.clear();
                    }
                }
            }

            let streaming: Vec<_> = log.messages().iter().filter(|m| m.is_streaming()).collect();
            assert!(streaming.len() <= 1, "seed {}: two streaming messages", seed);
            if let Some(message) = streaming.first() {
                assert_eq!(message.role, Role::Assistant, "seed {}", seed);
                assert_eq!(
                    message.index,
                    log.last().unwrap().index,
                    "seed {}: streaming message is not last",
                    seed
                );
            }
        }
    }
}
