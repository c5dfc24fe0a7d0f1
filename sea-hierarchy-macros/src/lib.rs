use proc_macro::TokenStream;
use quote::{format_ident, quote};
use syn::ext::IdentExt;
use syn::{
    parse_macro_input, spanned::Spanned, Attribute, Data, DeriveInput, Fields, Ident, Path, Type,
};

#[proc_macro_derive(HierarchyModel, attributes(hierarchy))]
pub fn derive_hierarchy_model(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match impl_hierarchy_model(&input) {
        Ok(tokens) => tokens,
        Err(err) => err.to_compile_error().into(),
    }
}

#[derive(Default)]
struct Options {
    id_field: Option<String>,
    id_type: Option<Type>,
    parent_field: Option<String>,
    level_field: Option<String>,
    name_field: Option<String>,
    edge_module: Option<Path>,
    edge_table: Option<String>,
    entity_name: Option<String>,
    edge_name: Option<String>,
    ancestor_field: Option<String>,
    descendant_field: Option<String>,
    delete_behavior: Option<String>,
}

fn impl_hierarchy_model(input: &DeriveInput) -> syn::Result<TokenStream> {
    let struct_ident = &input.ident;

    let data_struct = match &input.data {
        Data::Struct(data) => data,
        _ => {
            return Err(syn::Error::new(
                input.span(),
                "HierarchyModel can only be derived for structs",
            ))
        }
    };

    let mut options = Options::default();
    let mut table_name: Option<String> = None;

    for attr in &input.attrs {
        if attr.path().is_ident("hierarchy") {
            parse_hierarchy_attr(attr, &mut options)?;
        }

        if attr.path().is_ident("sea_orm") {
            if let Some(name) = parse_sea_orm_table_name(attr)? {
                table_name = Some(name);
            }
        }
    }

    let id_field_name = options.id_field.unwrap_or_else(|| "id".to_string());
    let parent_field_name = options
        .parent_field
        .unwrap_or_else(|| "parent_id".to_string());
    let level_field_name = options.level_field.unwrap_or_else(|| "level".to_string());
    let name_field_name = options.name_field.unwrap_or_else(|| "name".to_string());
    let ancestor_field_name = options
        .ancestor_field
        .unwrap_or_else(|| "ancestor_id".to_string());
    let descendant_field_name = options
        .descendant_field
        .unwrap_or_else(|| "descendant_id".to_string());

    let id_field_ident = Ident::new(&id_field_name, struct_ident.span());
    let parent_field_ident = Ident::new(&parent_field_name, struct_ident.span());
    let level_field_ident = Ident::new(&level_field_name, struct_ident.span());
    let name_field_ident = Ident::new(&name_field_name, struct_ident.span());
    let ancestor_field_ident = Ident::new(&ancestor_field_name, struct_ident.span());
    let descendant_field_ident = Ident::new(&descendant_field_name, struct_ident.span());

    let mut id_field_type: Option<Type> = options.id_type.clone();

    if let Fields::Named(ref fields) = data_struct.fields {
        for field in &fields.named {
            if let Some(ident) = &field.ident {
                if ident == &id_field_ident && id_field_type.is_none() {
                    id_field_type = Some(field.ty.clone());
                }
            }
        }
    } else {
        return Err(syn::Error::new(
            data_struct.fields.span(),
            "HierarchyModel requires named fields",
        ));
    }

    let id_type = id_field_type.ok_or_else(|| {
        syn::Error::new(
            struct_ident.span(),
            "Unable to determine id field type; specify `id_type = ...` in #[hierarchy]",
        )
    })?;

    let edge_module_path = options
        .edge_module
        .ok_or_else(|| syn::Error::new(struct_ident.span(), "`edge_module` must be set"))?;

    // Every DeriveEntityModel struct is called `Model`, so the table name is
    // the only default that keeps advisory-lock keys distinct per entity.
    let base_table = table_name.unwrap_or_else(|| struct_ident.unraw().to_string());
    let edge_table = options
        .edge_table
        .unwrap_or_else(|| format!("{}_edges", base_table));
    let entity_name = options.entity_name.unwrap_or_else(|| base_table.clone());
    let edge_name = options.edge_name.unwrap_or_else(|| edge_table.clone());

    let id_column_variant = format_ident!("{}", to_pascal_case(&id_field_name));
    let parent_column_variant = format_ident!("{}", to_pascal_case(&parent_field_name));
    let level_column_variant = format_ident!("{}", to_pascal_case(&level_field_name));
    let name_column_variant = format_ident!("{}", to_pascal_case(&name_field_name));
    let ancestor_column_variant = format_ident!("{}", to_pascal_case(&ancestor_field_name));
    let descendant_column_variant = format_ident!("{}", to_pascal_case(&descendant_field_name));

    let parent_column_literal = syn::LitStr::new(&parent_field_name, struct_ident.span());
    let level_column_literal = syn::LitStr::new(&level_field_name, struct_ident.span());
    let name_column_literal = syn::LitStr::new(&name_field_name, struct_ident.span());
    let edge_table_literal = syn::LitStr::new(&edge_table, struct_ident.span());
    let delete_behavior_call = match options.delete_behavior.as_deref() {
        None => quote! {},
        Some("cascade") => {
            quote! { .delete_behavior(::sea_hierarchy::DeleteBehavior::Cascade) }
        }
        Some("detach") => {
            quote! { .delete_behavior(::sea_hierarchy::DeleteBehavior::Detach) }
        }
        Some(_) => unreachable!("validated while parsing the attribute"),
    };
    let entity_name_literal = syn::LitStr::new(&entity_name, struct_ident.span());
    let edge_name_literal = syn::LitStr::new(&edge_name, struct_ident.span());

    let generated = quote! {
        impl ::sea_hierarchy::HierarchyModel for #struct_ident {
            type Entity = Entity;
            type ActiveModel = ActiveModel;
            type Id = #id_type;

            type EdgeEntity = #edge_module_path::Entity;
            type EdgeModel = #edge_module_path::Model;
            type EdgeActiveModel = #edge_module_path::ActiveModel;

            fn hierarchy_config() -> &'static ::sea_hierarchy::HierarchyConfig {
                static CONFIG: ::once_cell::sync::Lazy<::sea_hierarchy::HierarchyConfig> =
                    ::once_cell::sync::Lazy::new(|| {
                        let base = ::sea_hierarchy::HierarchyConfig::new(
                            #entity_name_literal,
                            #edge_name_literal,
                        );
                        ::sea_hierarchy::HierarchyOptions::default()
                            .parent_column(#parent_column_literal)
                            .level_column(#level_column_literal)
                            .name_column(#name_column_literal)
                            .edge_table(#edge_table_literal)
                            #delete_behavior_call
                            .apply(base)
                    });
                &CONFIG
            }

            fn id(&self) -> Self::Id {
                self.#id_field_ident.clone()
            }

            fn parent_id(&self) -> Option<Self::Id> {
                self.#parent_field_ident.clone()
            }

            fn level(&self) -> i32 {
                self.#level_field_ident
            }

            fn set_parent(active: &mut Self::ActiveModel, parent: Option<Self::Id>) {
                active.#parent_field_ident = ::sea_orm::ActiveValue::Set(parent);
            }

            fn set_level(active: &mut Self::ActiveModel, level: i32) {
                active.#level_field_ident = ::sea_orm::ActiveValue::Set(level);
            }

            fn id_to_value(id: &Self::Id) -> ::sea_orm::Value {
                ::sea_orm::Value::from(id.clone())
            }

            fn name(&self) -> &str {
                self.#name_field_ident.as_str()
            }

            fn set_name(active: &mut Self::ActiveModel, name: &str) {
                active.#name_field_ident = ::sea_orm::ActiveValue::Set(name.to_owned());
            }

            fn id_column() -> <Self::Entity as ::sea_orm::EntityTrait>::Column {
                Column::#id_column_variant
            }

            fn parent_column() -> <Self::Entity as ::sea_orm::EntityTrait>::Column {
                Column::#parent_column_variant
            }

            fn level_column() -> <Self::Entity as ::sea_orm::EntityTrait>::Column {
                Column::#level_column_variant
            }

            fn name_column() -> <Self::Entity as ::sea_orm::EntityTrait>::Column {
                Column::#name_column_variant
            }

            fn edge_descendant_column() -> <Self::EdgeEntity as ::sea_orm::EntityTrait>::Column {
                #edge_module_path::Column::#descendant_column_variant
            }

            fn edge_ancestor_column() -> <Self::EdgeEntity as ::sea_orm::EntityTrait>::Column {
                #edge_module_path::Column::#ancestor_column_variant
            }

            fn edge_id_to_value(id: &Self::Id) -> ::sea_orm::Value {
                ::sea_orm::Value::from(id.clone())
            }

            fn edge_descendant(model: &Self::EdgeModel) -> Self::Id {
                model.#descendant_field_ident.clone()
            }

            fn edge_ancestor(model: &Self::EdgeModel) -> Self::Id {
                model.#ancestor_field_ident.clone()
            }

            fn edge_row(descendant: Self::Id, ancestor: Self::Id) -> Self::EdgeActiveModel {
                #[allow(clippy::needless_update)]
                {
                    #edge_module_path::ActiveModel {
                        #descendant_field_ident: ::sea_orm::ActiveValue::Set(descendant),
                        #ancestor_field_ident: ::sea_orm::ActiveValue::Set(ancestor),
                        ..::core::default::Default::default()
                    }
                }
            }
        }
    };

    Ok(generated.into())
}

fn parse_hierarchy_attr(attr: &Attribute, options: &mut Options) -> syn::Result<()> {
    attr.parse_nested_meta(|meta| {
        let ident = meta
            .path
            .get_ident()
            .ok_or_else(|| syn::Error::new(meta.path.span(), "Invalid option key"))?
            .to_string();

        match ident.as_str() {
            "id_field" => {
                let value: syn::LitStr = meta.value()?.parse()?;
                options.id_field = Some(value.value());
            }
            "parent_field" => {
                let value: syn::LitStr = meta.value()?.parse()?;
                options.parent_field = Some(value.value());
            }
            "level_field" => {
                let value: syn::LitStr = meta.value()?.parse()?;
                options.level_field = Some(value.value());
            }
            "name_field" => {
                let value: syn::LitStr = meta.value()?.parse()?;
                options.name_field = Some(value.value());
            }
            "edge_module" => {
                let value: syn::LitStr = meta.value()?.parse()?;
                options.edge_module = Some(parse_path(&value.value(), value.span())?);
            }
            "edge_table" => {
                let value: syn::LitStr = meta.value()?.parse()?;
                options.edge_table = Some(value.value());
            }
            "entity_name" => {
                let value: syn::LitStr = meta.value()?.parse()?;
                options.entity_name = Some(value.value());
            }
            "edge_name" => {
                let value: syn::LitStr = meta.value()?.parse()?;
                options.edge_name = Some(value.value());
            }
            "ancestor_field" => {
                let value: syn::LitStr = meta.value()?.parse()?;
                options.ancestor_field = Some(value.value());
            }
            "descendant_field" => {
                let value: syn::LitStr = meta.value()?.parse()?;
                options.descendant_field = Some(value.value());
            }
            "delete_behavior" => {
                let value: syn::LitStr = meta.value()?.parse()?;
                let behavior = value.value();
                if behavior != "cascade" && behavior != "detach" {
                    return Err(syn::Error::new(
                        value.span(),
                        "delete_behavior must be \"cascade\" or \"detach\"",
                    ));
                }
                options.delete_behavior = Some(behavior);
            }
            "id_type" => {
                let ty: Type = meta.value()?.parse()?;
                options.id_type = Some(ty);
            }
            other => {
                return Err(syn::Error::new(
                    meta.path.span(),
                    format!("Unsupported hierarchy option `{other}`"),
                ));
            }
        }

        Ok(())
    })
}

fn parse_sea_orm_table_name(attr: &Attribute) -> syn::Result<Option<String>> {
    let mut table_name: Option<String> = None;
    attr.parse_nested_meta(|meta| {
        if meta.path.is_ident("table_name") {
            let value: syn::LitStr = meta.value()?.parse()?;
            table_name = Some(value.value());
        }
        Ok(())
    })?;
    Ok(table_name)
}

fn parse_path(value: &str, span: proc_macro2::Span) -> syn::Result<Path> {
    syn::parse_str::<Path>(value).map_err(|_| syn::Error::new(span, "Invalid path"))
}

fn to_pascal_case(value: &str) -> String {
    value
        .split('_')
        .filter(|segment| !segment.is_empty())
        .map(|segment| {
            let mut chars = segment.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect()
}
