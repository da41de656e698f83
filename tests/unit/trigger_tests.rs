/*!
 * Tests for trigger message parsing
 */

use cookloc::Trigger;
use cookloc::database::repository::EventRef;
use tokio_test::{assert_err, assert_ok};

#[test]
fn test_fromMessage_withObjectNamingNoEvents_shouldBeScheduled() {
    assert_eq!(
        Trigger::from_message(r#"{"source": "cron"}"#).unwrap(),
        Trigger::Scheduled { limit: None }
    );
}

#[test]
fn test_fromMessage_withIdList_shouldKeepOrderAndDropDuplicates() {
    let trigger = assert_ok!(Trigger::from_message(r#"{"event_ids": [5, 2, 5, "9"]}"#));

    assert_eq!(
        trigger,
        Trigger::Explicit(vec![EventRef::Id(5), EventRef::Id(2), EventRef::Id(9)])
    );
}

#[test]
fn test_fromMessage_withInlineRecordBody_shouldParse() {
    let trigger = assert_ok!(Trigger::from_message(r#"{"Records": [{"body": {"event_id": 12}}]}"#));

    assert_eq!(trigger, Trigger::Explicit(vec![EventRef::Id(12)]));
}

#[test]
fn test_fromMessage_withRecordMissingBody_shouldFail() {
    assert_err!(Trigger::from_message(r#"{"Records": [{"messageId": "m-1"}]}"#));
}

#[test]
fn test_fromMessage_withNonArrayIds_shouldFail() {
    assert_err!(Trigger::from_message(r#"{"event_ids": 4}"#));
}

#[test]
fn test_eventRefFromStr_shouldSplitIdsAndPublicIds() {
    assert_eq!("42".parse::<EventRef>().unwrap(), EventRef::Id(42));
    assert_eq!(
        " 0f8fad5b-d9cb-469f-a165-70867728950e ".parse::<EventRef>().unwrap(),
        EventRef::PublicId("0f8fad5b-d9cb-469f-a165-70867728950e".to_string())
    );
    assert!("".parse::<EventRef>().is_err());
}
