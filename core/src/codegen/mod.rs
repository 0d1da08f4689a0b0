//! Module generators: pure `WalletConfig -> GeneratedModule` string
//! transformations. No network access, no clocks inside module text, so
//! identical input yields byte-identical output.

pub mod assembler;
pub mod integration;
pub mod policy;
pub mod roles;

pub use assembler::assemble;
pub use integration::generate_integration_module;
pub use policy::generate_policy_module;
pub use roles::generate_roles_module;

pub(crate) const SOLIDITY_HEADER: &str =
    "// SPDX-License-Identifier: MIT\npragma solidity ^0.8.19;\n";

/// Uppercase the first ASCII letter, for composing camelCase accessor names
/// from a derived identifier.
pub(crate) fn capitalize(ident: &str) -> String {
    let mut chars = ident.chars();
    match chars.next() {
        Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
        None => String::new(),
    }
}

/// Escape a configuration string for embedding in a Solidity string literal.
pub(crate) fn sol_str(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Embed a configured address as a Solidity expression. Wrapped through
/// `uint160` because solc rejects bare hex address literals whose casing
/// fails the EIP-55 checksum.
pub(crate) fn sol_addr(addr: &str) -> String {
    format!("address(uint160({}))", addr)
}
