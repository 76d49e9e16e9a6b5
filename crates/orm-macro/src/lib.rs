#![doc = include_str!("../README.md")]

//! # Entity Derive Macro

#![forbid(unsafe_code)]

mod entity;
mod expand;

use proc_macro::TokenStream;
use syn::{DeriveInput, parse_macro_input};

/// Derives `tabula_orm::Entity`, recording table, key and column markers as
/// static metadata and generating row materialization.
///
/// # Example
///
/// ```ignore
/// #[derive(Entity)]
/// #[entity(table = "users")]
/// pub struct User {
///     #[entity(key)]
///     pub id: i64,
///     pub name: String,
/// }
/// ```
#[proc_macro_derive(Entity, attributes(entity))]
pub fn derive_entity(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    let model = match entity::Model::try_from(input) {
        Ok(model) => model,
        Err(e) => return e.into_compile_error().into(),
    };
    expand::expand(&model).into()
}
