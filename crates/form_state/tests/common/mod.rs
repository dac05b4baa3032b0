#![allow(dead_code)]

use form_state::{FieldPath, SetValueOptions};

pub fn path(name: &str) -> FieldPath {
    name.parse().unwrap()
}

pub fn dirty() -> SetValueOptions {
    SetValueOptions {
        should_dirty: true,
        ..SetValueOptions::default()
    }
}

pub fn validated() -> SetValueOptions {
    SetValueOptions {
        should_validate: true,
        ..SetValueOptions::default()
    }
}
