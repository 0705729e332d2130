use psgsync_common::sync::{self, StateCorruption, SyncError};
use psgsync_proc_macros::{EnumDisplay, EnumFromStr, SyncState};
use test_log::test;

#[derive(Debug, Clone, Default, PartialEq, Eq, SyncState)]
#[sync(section = "Inner")]
struct Inner {
    #[sync(array)]
    volume: [u8; 4],
    #[sync(array, compress)]
    tone: [u16; 3],
    #[sync(name = "Chan_sel")]
    channel_select: u8,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, SyncState)]
struct Outer {
    #[sync(nested)]
    inner: Inner,
    #[sync(name = "Lag")]
    lag_count: i32,
    #[sync(name = "IsLag")]
    is_lag: bool,
    #[sync(skip)]
    scratch: Vec<u8>,
}

#[derive(Debug, Default, PartialEq, Eq, SyncState)]
struct Pair(u16, #[sync(name = "second")] i8);

fn sample_outer() -> Outer {
    Outer {
        inner: Inner { volume: [0, 5, 10, 15], tone: [0x35, 0x3FF, 0], channel_select: 3 },
        lag_count: 42,
        is_lag: true,
        scratch: vec![1, 2, 3],
    }
}

#[test]
fn nested_sub_state_is_visited_first() {
    let text = sync::save_text(&mut sample_outer()).unwrap();
    assert_eq!(
        text,
        "[Inner]\n  volume 0 5 10 15\n  tone 53 1023 0\n  Chan_sel 3\n[/Inner]\nLag 42\nIsLag true\n"
    );
}

#[test]
fn derived_binary_round_trip() {
    let mut original = sample_outer();
    let bytes = sync::save_binary(&mut original).unwrap();

    let mut loaded = Outer::default();
    sync::load_binary(&mut loaded, &bytes).unwrap();

    assert_eq!(loaded.inner, original.inner);
    assert_eq!(loaded.lag_count, 42);
    assert!(loaded.is_lag);
    assert!(loaded.scratch.is_empty());
}

#[test]
fn derived_text_round_trip() {
    let mut original = sample_outer();
    let text = sync::save_text(&mut original).unwrap();

    let mut loaded = Outer::default();
    sync::load_text(&mut loaded, &text).unwrap();

    assert_eq!(loaded.inner, original.inner);
    assert_eq!(loaded.lag_count, original.lag_count);
    assert_eq!(loaded.is_lag, original.is_lag);
}

#[test]
fn tuple_struct_keys() {
    let text = sync::save_text(&mut Pair(7, -3)).unwrap();
    assert_eq!(text, "0 7\nsecond -3\n");

    let mut loaded = Pair::default();
    sync::load_text(&mut loaded, &text).unwrap();
    assert_eq!(loaded, Pair(7, -3));
}

#[test]
fn missing_nested_section() {
    let err = sync::load_text(&mut Outer::default(), "Lag 1\nIsLag false\n").unwrap_err();
    assert!(
        matches!(&err, SyncError::Corruption(StateCorruption::MissingSection(name)) if name == "Inner"),
        "{err}"
    );
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumDisplay, EnumFromStr)]
enum Medium {
    Binary,
    Text,
}

#[test]
fn enum_display_and_from_str() {
    assert_eq!(Medium::Binary.to_string(), "Binary");
    assert_eq!(Medium::Text.to_str(), "Text");
    assert_eq!("text".parse::<Medium>(), Ok(Medium::Text));
    assert_eq!("BINARY".parse::<Medium>(), Ok(Medium::Binary));
    assert!("tape".parse::<Medium>().is_err());
}
