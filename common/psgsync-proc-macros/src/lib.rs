mod enums;
mod sync;

use proc_macro::TokenStream;

/// Implement the `std::fmt::Display` trait for the given enum, writing the variant name. Only
/// supports enums which have only fieldless variants.
///
/// # Panics
///
/// This macro will panic if applied to a struct, a union, or an enum with any variants that have
/// fields.
#[proc_macro_derive(EnumDisplay)]
pub fn enum_display(input: TokenStream) -> TokenStream {
    enums::enum_display(input)
}

/// Implement the `std::str::FromStr` trait for the given enum, with `FromStr::Err` set to `String`.
/// Only supports enums which have only fieldless variants. The generated implementation will be
/// case-insensitive.
///
/// # Panics
///
/// This macro will panic if applied to a struct, a union, or an enum with any variants that have
/// fields.
#[proc_macro_derive(EnumFromStr)]
pub fn enum_from_str(input: TokenStream) -> TokenStream {
    enums::enum_from_str(input)
}

/// Implement `psgsync_common::sync::SyncState` for a struct by visiting its fields in declaration
/// order. Reordering fields changes the persisted format.
///
/// Struct attribute:
/// - `#[sync(section = "Name")]` wraps the fields in a named section
///
/// Field attributes:
/// - `#[sync(name = "Key")]` overrides the key, which defaults to the field name
/// - `#[sync(nested)]` delegates to the field's own `SyncState` implementation
/// - `#[sync(array)]` synchronizes the field as an array; add `compress` to request compression
/// - `#[sync(skip)]` leaves the field out of the persisted state
///
/// Examples:
/// ```
/// use psgsync_common::sync::{self, SyncState};
/// use psgsync_proc_macros::SyncState;
///
/// #[derive(Debug, Default, PartialEq, SyncState)]
/// #[sync(section = "Timer")]
/// struct Timer {
///     #[sync(name = "Reload")]
///     reload: u16,
///     #[sync(array, compress)]
///     history: [u8; 3],
///     #[sync(skip)]
///     label: String,
/// }
///
/// let mut timer = Timer { reload: 0x3FF, history: [1, 2, 3], label: "A".into() };
/// let text = sync::save_text(&mut timer).unwrap();
/// assert_eq!(text, "[Timer]\n  Reload 1023\n  history 1 2 3\n[/Timer]\n");
///
/// let mut loaded = Timer::default();
/// sync::load_text(&mut loaded, &text).unwrap();
/// assert_eq!(loaded.reload, 0x3FF);
/// assert_eq!(loaded.history, [1, 2, 3]);
/// assert_eq!(loaded.label, "");
/// ```
///
/// # Panics
///
/// This macro will panic if applied to an enum or a union, or if a `sync` attribute combines
/// options that conflict.
#[proc_macro_derive(SyncState, attributes(sync))]
pub fn sync_state(input: TokenStream) -> TokenStream {
    sync::sync_state(input)
}
