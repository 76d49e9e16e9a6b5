use syn::ext::IdentExt;
use syn::meta::ParseNestedMeta;
use syn::{Attribute, Data, DeriveInput, Error, Fields, Generics, Ident, LitBool, LitStr, Result, Type};

/// Entity definition parsed from a `#[derive(Entity)]` input.
pub struct Model {
    pub ident: Ident,
    pub generics: Generics,
    pub table: Option<LitStr>,
    pub default_sort: Option<LitStr>,
    pub interface: bool,
    pub fields: Vec<Property>,
}

/// A struct field and its markers.
pub struct Property {
    pub ident: Ident,
    pub ty: Type,
    pub name: String,
    pub column: String,
    pub key: bool,
    pub explicit_key: bool,
    pub computed: bool,
    pub ignore_update: bool,
    pub write: bool,
}

impl TryFrom<DeriveInput> for Model {
    type Error = Error;

    fn try_from(input: DeriveInput) -> Result<Self> {
        let Data::Struct(data) = input.data else {
            return Err(Error::new_spanned(&input.ident, "`Entity` can only be derived for structs"));
        };
        let Fields::Named(named) = data.fields else {
            return Err(Error::new_spanned(&input.ident, "`Entity` requires named fields"));
        };

        let mut model = Self {
            ident: input.ident,
            generics: input.generics,
            table: None,
            default_sort: None,
            interface: false,
            fields: Vec::new(),
        };
        for attr in entity_attrs(&input.attrs) {
            attr.parse_nested_meta(|meta| model.parse(&meta))?;
        }

        for field in named.named {
            let Some(ident) = field.ident else {
                continue;
            };
            let name = ident.unraw().to_string();
            let mut property = Property {
                column: name.clone(),
                name,
                ident,
                ty: field.ty,
                key: false,
                explicit_key: false,
                computed: false,
                ignore_update: false,
                write: true,
            };
            for attr in entity_attrs(&field.attrs) {
                attr.parse_nested_meta(|meta| property.parse(&meta))?;
            }
            if property.key && property.explicit_key {
                return Err(Error::new_spanned(
                    &property.ident,
                    "a property cannot be both `key` and `explicit_key`",
                ));
            }
            model.fields.push(property);
        }

        if let Some(sort) = &model.default_sort
            && !model.fields.iter().any(|field| field.name == sort.value())
        {
            return Err(Error::new_spanned(sort, "`default_sort` must name a field of the struct"));
        }

        Ok(model)
    }
}

fn entity_attrs(attrs: &[Attribute]) -> impl Iterator<Item = &Attribute> {
    attrs.iter().filter(|attr| attr.path().is_ident("entity"))
}

// See https://docs.rs/syn/latest/syn/meta/fn.parser.html
impl Model {
    fn parse(&mut self, meta: &ParseNestedMeta) -> Result<()> {
        if meta.path.is_ident("table") {
            self.table = Some(meta.value()?.parse()?);
        } else if meta.path.is_ident("default_sort") {
            self.default_sort = Some(meta.value()?.parse()?);
        } else if meta.path.is_ident("interface") {
            self.interface = true;
        } else {
            return Err(meta.error("unsupported entity property"));
        }
        Ok(())
    }
}

impl Property {
    fn parse(&mut self, meta: &ParseNestedMeta) -> Result<()> {
        if meta.path.is_ident("key") {
            self.key = true;
        } else if meta.path.is_ident("explicit_key") {
            self.explicit_key = true;
        } else if meta.path.is_ident("computed") {
            self.computed = true;
        } else if meta.path.is_ident("ignore_update") {
            self.ignore_update = true;
        } else if meta.path.is_ident("write") {
            let write: LitBool = meta.value()?.parse()?;
            self.write = write.value;
        } else if meta.path.is_ident("column") {
            let column: LitStr = meta.value()?.parse()?;
            self.column = column.value();
        } else {
            return Err(meta.error("unsupported field property"));
        }
        Ok(())
    }
}
