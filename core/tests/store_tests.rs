/// Store tests
/// Integration tests for the message ledger, read cursors and the unread projection

use dialog_core::cursors::ReadCursorStore;
use dialog_core::ledger::MessageLedger;
use dialog_core::types::conversation_key;
use dialog_core::unread::UnreadProjection;
use dialog_core::ChatError;
use std::thread;

#[test]
fn test_append_assigns_increasing_seq() {
    let dir = tempfile::tempdir().unwrap();
    let ledger = MessageLedger::new(dir.path()).unwrap();

    let m1 = ledger.append(1, 2, "hi").unwrap();
    let m2 = ledger.append(2, 1, "hello").unwrap();
    let m3 = ledger.append(1, 2, "how are you?").unwrap();

    assert_eq!(m1.seq, 1);
    assert_eq!(m2.seq, 2);
    assert_eq!(m3.seq, 3);
    // Both directions land in the same canonical conversation
    assert_eq!(m1.conversation_id, m2.conversation_id);
    assert_eq!(m1.conversation_id, "dm:1:2");
}

#[test]
fn test_list_since_filters_and_orders() {
    let dir = tempfile::tempdir().unwrap();
    let ledger = MessageLedger::new(dir.path()).unwrap();

    for i in 0..5 {
        ledger.append(1, 2, &format!("message {}", i)).unwrap();
    }

    let conv = conversation_key(1, 2);
    let all = ledger.list_since(&conv, 0).unwrap();
    assert_eq!(all.len(), 5);
    let seqs: Vec<u64> = all.iter().map(|m| m.seq).collect();
    assert_eq!(seqs, vec![1, 2, 3, 4, 5]);

    let tail = ledger.list_since(&conv, 3).unwrap();
    let seqs: Vec<u64> = tail.iter().map(|m| m.seq).collect();
    assert_eq!(seqs, vec![4, 5]);

    // Restartable: the same after_seq yields the same answer
    let again = ledger.list_since(&conv, 3).unwrap();
    assert_eq!(again.len(), tail.len());
}

#[test]
fn test_unknown_conversation_is_empty_not_error() {
    let dir = tempfile::tempdir().unwrap();
    let ledger = MessageLedger::new(dir.path()).unwrap();

    let messages = ledger.list_since(&conversation_key(10, 11), 0).unwrap();
    assert!(messages.is_empty());
    assert_eq!(ledger.head_seq(&conversation_key(10, 11)).unwrap(), 0);
}

#[test]
fn test_append_rejects_empty_content() {
    let dir = tempfile::tempdir().unwrap();
    let ledger = MessageLedger::new(dir.path()).unwrap();

    for bad in ["", "   ", "\n\t  "] {
        match ledger.append(1, 2, bad) {
            Err(ChatError::InvalidContent) => {}
            other => panic!("expected InvalidContent, got {:?}", other),
        }
    }
    assert_eq!(ledger.head_seq(&conversation_key(1, 2)).unwrap(), 0);
}

#[test]
fn test_append_trims_content() {
    let dir = tempfile::tempdir().unwrap();
    let ledger = MessageLedger::new(dir.path()).unwrap();

    let msg = ledger.append(1, 2, "  hi there  ").unwrap();
    assert_eq!(msg.content, "hi there");
}

#[test]
fn test_concurrent_appends_keep_seq_strictly_increasing() {
    let dir = tempfile::tempdir().unwrap();
    let ledger = MessageLedger::new(dir.path()).unwrap();

    let mut handles = Vec::new();
    for writer in 0..8u64 {
        let ledger = ledger.clone();
        handles.push(thread::spawn(move || {
            for i in 0..25 {
                ledger
                    .append(1, 2, &format!("writer {} message {}", writer, i))
                    .unwrap();
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    let messages = ledger.list_since(&conversation_key(1, 2), 0).unwrap();
    assert_eq!(messages.len(), 200);
    // Unique, strictly increasing, no gaps below the max
    let seqs: Vec<u64> = messages.iter().map(|m| m.seq).collect();
    let expected: Vec<u64> = (1..=200).collect();
    assert_eq!(seqs, expected);
}

#[test]
fn test_conversations_are_independent() {
    let dir = tempfile::tempdir().unwrap();
    let ledger = MessageLedger::new(dir.path()).unwrap();

    ledger.append(1, 2, "one").unwrap();
    ledger.append(1, 2, "two").unwrap();
    let other = ledger.append(3, 4, "separate thread").unwrap();

    // Each conversation numbers its own ledger from 1
    assert_eq!(other.seq, 1);
    assert_eq!(ledger.head_seq(&conversation_key(1, 2)).unwrap(), 2);
    assert_eq!(ledger.head_seq(&conversation_key(3, 4)).unwrap(), 1);
}

#[test]
fn test_conversations_of_lists_participations() {
    let dir = tempfile::tempdir().unwrap();
    let ledger = MessageLedger::new(dir.path()).unwrap();

    ledger.append(1, 2, "a").unwrap();
    ledger.append(3, 2, "b").unwrap();
    ledger.append(4, 5, "c").unwrap();

    let convs = ledger.conversations_of(2).unwrap();
    let mut ids: Vec<String> = convs.iter().map(|c| c.conversation_id.clone()).collect();
    ids.sort();
    assert_eq!(ids, vec!["dm:1:2".to_string(), "dm:2:3".to_string()]);
    assert_eq!(convs[0].other_party(2), 1);
}

#[test]
fn test_cursor_defaults_to_zero() {
    let dir = tempfile::tempdir().unwrap();
    let cursors = ReadCursorStore::new(dir.path()).unwrap();

    assert_eq!(cursors.get(&conversation_key(1, 2), 2).unwrap(), 0);
}

#[test]
fn test_cursor_never_regresses() {
    let dir = tempfile::tempdir().unwrap();
    let cursors = ReadCursorStore::new(dir.path()).unwrap();
    let conv = conversation_key(1, 2);

    assert_eq!(cursors.advance(&conv, 2, 5).unwrap(), 5);
    // A stale value from a slow request leaves the newer one in place
    assert_eq!(cursors.advance(&conv, 2, 3).unwrap(), 5);
    assert_eq!(cursors.get(&conv, 2).unwrap(), 5);
    assert_eq!(cursors.advance(&conv, 2, 7).unwrap(), 7);
}

#[test]
fn test_cursor_is_per_conversation_and_reader() {
    let dir = tempfile::tempdir().unwrap();
    let cursors = ReadCursorStore::new(dir.path()).unwrap();

    cursors.advance(&conversation_key(1, 2), 2, 4).unwrap();

    assert_eq!(cursors.get(&conversation_key(1, 2), 1).unwrap(), 0);
    assert_eq!(cursors.get(&conversation_key(2, 3), 2).unwrap(), 0);
    assert_eq!(cursors.get(&conversation_key(1, 2), 2).unwrap(), 4);
}

#[test]
fn test_unread_count_lifecycle() {
    let dir = tempfile::tempdir().unwrap();
    let ledger = MessageLedger::new(dir.path()).unwrap();
    let cursors = ReadCursorStore::new(dir.path()).unwrap();
    let unread = UnreadProjection::new(ledger.clone(), cursors.clone());
    let conv = conversation_key(1, 2);

    for i in 0..3 {
        ledger.append(1, 2, &format!("message {}", i)).unwrap();
    }
    assert_eq!(unread.count(&conv, 2).unwrap(), 3);

    cursors.advance(&conv, 2, 3).unwrap();
    assert_eq!(unread.count(&conv, 2).unwrap(), 0);

    ledger.append(1, 2, "one more").unwrap();
    assert_eq!(unread.count(&conv, 2).unwrap(), 1);
}

#[test]
fn test_own_messages_never_count_as_unread() {
    let dir = tempfile::tempdir().unwrap();
    let ledger = MessageLedger::new(dir.path()).unwrap();
    let cursors = ReadCursorStore::new(dir.path()).unwrap();
    let unread = UnreadProjection::new(ledger.clone(), cursors);
    let conv = conversation_key(1, 2);

    ledger.append(1, 2, "to you").unwrap();
    ledger.append(1, 2, "and again").unwrap();

    // No mark-read has happened, yet the sender owes themselves nothing
    assert_eq!(unread.count(&conv, 1).unwrap(), 0);
    assert_eq!(unread.count(&conv, 2).unwrap(), 2);
}

#[test]
fn test_summary_counts_conversations_independently() {
    let dir = tempfile::tempdir().unwrap();
    let ledger = MessageLedger::new(dir.path()).unwrap();
    let cursors = ReadCursorStore::new(dir.path()).unwrap();
    let unread = UnreadProjection::new(ledger.clone(), cursors.clone());

    ledger.append(1, 2, "hi").unwrap();
    ledger.append(3, 2, "hey").unwrap();
    ledger.append(3, 2, "you up?").unwrap();

    let summary = unread.summary(2).unwrap();
    assert_eq!(summary.get("dm:1:2"), Some(&1));
    assert_eq!(summary.get("dm:2:3"), Some(&2));
    assert_eq!(unread.total(2).unwrap(), 3);

    // Marking one conversation read must not affect the other's count
    cursors.advance(&conversation_key(2, 3), 2, 2).unwrap();
    let summary = unread.summary(2).unwrap();
    assert_eq!(summary.get("dm:1:2"), Some(&1));
    assert_eq!(summary.get("dm:2:3"), Some(&0));
    assert_eq!(unread.total(2).unwrap(), 1);
}

#[test]
fn test_state_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let conv = conversation_key(1, 2);

    {
        let ledger = MessageLedger::new(dir.path()).unwrap();
        let cursors = ReadCursorStore::new(dir.path()).unwrap();
        ledger.append(1, 2, "hi").unwrap();
        ledger.append(1, 2, "there").unwrap();
        cursors.advance(&conv, 2, 1).unwrap();
        ledger.flush().unwrap();
        cursors.flush().unwrap();
    }

    // Reopen on the same data directory
    let ledger = MessageLedger::new(dir.path()).unwrap();
    let cursors = ReadCursorStore::new(dir.path()).unwrap();

    let messages = ledger.list_since(&conv, 0).unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(ledger.head_seq(&conv).unwrap(), 2);
    assert_eq!(cursors.get(&conv, 2).unwrap(), 1);

    let unread = UnreadProjection::new(ledger.clone(), cursors);
    assert_eq!(unread.count(&conv, 2).unwrap(), 1);

    // Sequence assignment continues from the persisted head
    let next = ledger.append(2, 1, "welcome back").unwrap();
    assert_eq!(next.seq, 3);
}
