//! Core types for the ragtime reference attribute grammar engine.
//!
//! This crate provides the foundational types shared by the rule parser
//! and the evaluation engine:
//!
//! - **Identifiers**: interned kind/slot/attribute names ([`identifier::Id`])
//! - **Values**: the dynamic value type carried by terminals, attribute
//!   arguments, and attribute results ([`value::Value`])
//! - **Grammar**: rule declarations and the compiled kind hierarchy
//!   ([`grammar::Grammar`])

pub mod grammar;
pub mod identifier;
pub mod value;
