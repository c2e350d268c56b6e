//! UI layer for polyviz using egui.
//!
//! Widgets edit plain state structs and report whether anything changed. The
//! owning quantity or structure applies the edited state through its setters.

pub mod info_ui;
pub mod quantity_ui;
pub mod structure_ui;

pub use info_ui::*;
pub use quantity_ui::*;
pub use structure_ui::*;
