use proc_macro::TokenStream;

use quote::quote;
use syn::{Attribute, Expr, ExprLit, ExprPath, ItemStruct, Lit, Meta, Token, parse::Parser, spanned::Spanned};

/// Declares an endpoint-specific response handler.
///
/// ```ignore
/// #[Endpoint(path = "update-price", reply = PriceReply, parse_error = "Error processing price update")]
/// pub struct PriceUpdate;
///
/// impl PriceUpdate {
///     fn on_reply(reply: &PriceReply, ctx: &mut ResponseCtx) { .. }
/// }
/// ```
///
/// The generated `EndpointHandler` impl ignores non-200 responses, decodes
/// the body as `reply`, and reports `parse_error` when decoding fails.
#[proc_macro_attribute]
#[allow(non_snake_case)]
pub fn Endpoint(attr: TokenStream, item: TokenStream) -> TokenStream {
    match endpoint_impl(attr, item) {
        Ok(ts) => ts,
        Err(e) => e.to_compile_error().into(),
    }
}

fn lit_str(expr: &Expr) -> syn::Result<String> {
    match expr {
        Expr::Lit(ExprLit {
            lit: Lit::Str(s), ..
        }) => Ok(s.value()),
        _ => Err(syn::Error::new(expr.span(), "expected string literal")),
    }
}

fn expr_type(expr: &Expr) -> syn::Result<syn::Type> {
    match expr {
        Expr::Path(ExprPath { path, .. }) => Ok(syn::Type::Path(syn::TypePath {
            qself: None,
            path: path.clone(),
        })),
        Expr::Lit(ExprLit {
            lit: Lit::Str(s), ..
        }) => syn::parse_str::<syn::Type>(&s.value()).map_err(|e| syn::Error::new(expr.span(), e)),
        _ => Err(syn::Error::new(
            expr.span(),
            "expected type (path) or string",
        )),
    }
}

fn strip_self(attrs: &[Attribute]) -> Vec<Attribute> {
    attrs
        .iter()
        .filter(|a| !a.path().is_ident("Endpoint"))
        .cloned()
        .collect()
}

struct EndpointMeta {
    path: String,
    reply: syn::Type,
    parse_error: String,
}

fn parse_meta(attr: TokenStream, ident: &syn::Ident) -> syn::Result<EndpointMeta> {
    let parser = syn::punctuated::Punctuated::<Meta, Token![,]>::parse_terminated;
    let metas = parser.parse(attr)?;

    let mut path: Option<String> = None;
    let mut reply: Option<syn::Type> = None;
    let mut parse_error: Option<String> = None;

    for m in metas {
        let Meta::NameValue(nv) = m else {
            return Err(syn::Error::new(m.span(), "expected key = value"));
        };
        let Some(key) = nv.path.get_ident().map(|i| i.to_string()) else {
            return Err(syn::Error::new(nv.path.span(), "expected ident key"));
        };
        let v = &nv.value;
        match key.as_str() {
            "path" => path = Some(lit_str(v)?),
            "reply" => reply = Some(expr_type(v)?),
            "parse_error" => parse_error = Some(lit_str(v)?),
            other => {
                return Err(syn::Error::new(
                    nv.path.span(),
                    format!("unknown Endpoint attribute key '{other}'"),
                ));
            }
        }
    }

    let path = path.ok_or_else(|| syn::Error::new(ident.span(), "Endpoint: missing path"))?;
    if path.trim().is_empty() {
        return Err(syn::Error::new(ident.span(), "Endpoint: path must not be empty"));
    }
    Ok(EndpointMeta {
        path,
        reply: reply.ok_or_else(|| syn::Error::new(ident.span(), "Endpoint: missing reply"))?,
        parse_error: parse_error
            .unwrap_or_else(|| "Error processing response".to_string()),
    })
}

fn endpoint_impl(attr: TokenStream, item: TokenStream) -> syn::Result<TokenStream> {
    let mut st: ItemStruct = syn::parse(item)?;
    st.attrs = strip_self(&st.attrs);
    let ident = st.ident.clone();

    let meta = parse_meta(attr, &ident)?;
    let path_lit = meta.path;
    let reply_ty = meta.reply;
    let parse_error_lit = meta.parse_error;

    let expanded = quote! {
        #st

        impl #ident {
            pub const PATH: &'static str = #path_lit;
        }

        impl crate::bridge::EndpointHandler for #ident {
            fn path(&self) -> &'static str {
                Self::PATH
            }

            fn handle(&self, status: u16, body: &str, ctx: &mut crate::bridge::ResponseCtx) {
                if status != 200 {
                    return;
                }
                match ::serde_json::from_str::<#reply_ty>(body) {
                    Ok(reply) => Self::on_reply(&reply, ctx),
                    Err(e) => {
                        ::tracing::warn!(endpoint = Self::PATH, error = %e, "unreadable endpoint reply");
                        ctx.notify(#parse_error_lit, crate::notify::Severity::Error);
                    }
                }
            }
        }
    };

    Ok(expanded.into())
}
