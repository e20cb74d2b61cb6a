//! Derives `fillet_opts::CmdLineOptions` for a struct. Use it through the `fillet_opts` crate.
//!
//! # Container attributes
//! `#[optcont(delimeters = "...", usage = "...", overview = "...", default_parser = "...")]`
//! - `delimeters` - characters that split `--name=value` into name and value (default `=`).
//! - `usage`, `overview` - text for the help message.
//! - `default_parser` - parser for fields without a `parser` attribute.
//!
//! # Field attributes
//! - `#[flag(name = "...", names("...", ...), desc = "...", env = "...")]` - a `bool` switch.
//! - `#[opt(name = "...", names(...), desc = "...", value_desc = "...", env = "...",
//!   parser = "...")]` - an option taking a value. The parser must implement
//!   `OptionValueParser` for the field type.
extern crate proc_macro;
extern crate proc_macro2;
extern crate quote;
extern crate syn;

mod opts;

use opts::expand;
use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, DeriveInput, Error};

#[proc_macro_derive(CmdLineOptions, attributes(optcont, opt, flag))]
pub fn derive_cmd_line_options(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    expand(&input)
        .unwrap_or_else(|errors| {
            let compile_errors = errors.iter().map(Error::to_compile_error);
            quote!(#(#compile_errors)*)
        })
        .into()
}
