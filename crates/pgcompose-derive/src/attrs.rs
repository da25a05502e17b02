//! Field-level `#[record(...)]` attribute parsing.

use syn::Result;

#[derive(Debug, Default)]
pub(crate) struct FieldAttr {
    pub column: Option<String>,
    pub skip: bool,
    pub embed: bool,
    pub untyped: bool,
}

impl syn::parse::Parse for FieldAttr {
    fn parse(input: syn::parse::ParseStream) -> Result<Self> {
        let mut attr = FieldAttr::default();

        while !input.is_empty() {
            let ident: syn::Ident = input.parse()?;
            match ident.to_string().as_str() {
                "skip" => attr.skip = true,
                "embed" => attr.embed = true,
                "untyped" => attr.untyped = true,
                "column" => {
                    let _: syn::Token![=] = input.parse()?;
                    let value: syn::LitStr = input.parse()?;
                    if value.value().is_empty() {
                        return Err(syn::Error::new_spanned(value, "column name cannot be empty"));
                    }
                    attr.column = Some(value.value());
                }
                _ => {
                    return Err(syn::Error::new_spanned(
                        ident,
                        "expected one of: column, skip, embed, untyped",
                    ));
                }
            }

            if input.peek(syn::Token![,]) {
                let _: syn::Token![,] = input.parse()?;
            } else {
                break;
            }
        }

        if !input.is_empty() {
            return Err(input.error("unexpected tokens in #[record(...)]"));
        }
        Ok(attr)
    }
}

/// Merge every `#[record(...)]` on a field.
pub(crate) fn field_attr(field: &syn::Field) -> Result<FieldAttr> {
    let mut merged = FieldAttr::default();
    for attr in &field.attrs {
        if !attr.path().is_ident("record") {
            continue;
        }
        let parsed: FieldAttr = attr.parse_args()?;
        if parsed.column.is_some() {
            merged.column = parsed.column;
        }
        merged.skip |= parsed.skip;
        merged.embed |= parsed.embed;
        merged.untyped |= parsed.untyped;
    }

    if merged.embed && (merged.column.is_some() || merged.untyped) {
        return Err(syn::Error::new_spanned(
            field,
            "#[record(embed)] cannot be combined with column or untyped",
        ));
    }
    Ok(merged)
}
