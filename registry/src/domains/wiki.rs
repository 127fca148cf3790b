//! Enterprise wiki: spaces, versioned pages and labels.

use serde_json::{Map, Value, json};

use crate::catalog::entity::{Active, Dependent, EntitySpec, Field, Literal, Owned};
use crate::catalog::shapes::{
    self, LinkSpec, ParentRef, SearchSpec, build_record, create_params, fetch, id_param,
    insert_new, touch,
};
use crate::contract::{Effect, Operation, ParamSpec, ParamType, ToolContext};
use crate::core::error::{ToolError, ToolResult};
use crate::core::filter::{Filters, filter_and_match};
use crate::core::ids::IdScheme;
use crate::core::record::{set, text};
use crate::core::store::{Record, scalar_text};
use crate::core::validate::{require_exists, require_text};

const CONTENT_FORMATS: &[&str] = &["md", "html", "wiki", "plain"];

static USER: EntitySpec = EntitySpec {
    collection: "users",
    label: "User",
    ids: IdScheme::Sequential,
    id_field: "id",
    id_param: "user_id",
    fields: &[
        Field::text("display_name", "Display name").required(),
        Field::text("email", "Email address").required(),
    ],
    unique: &["email"],
    timestamps: true,
    dependents: &[],
    owned: &[],
};

static SPACE: EntitySpec = EntitySpec {
    collection: "spaces",
    label: "Space",
    ids: IdScheme::Sequential,
    id_field: "id",
    id_param: "space_id",
    fields: &[
        Field::text("space_key", "Short unique key").required().create_only(),
        Field::text("name", "Space name").required(),
        Field::text("description", "What the space is for"),
        Field::reference("owner_id", "Owning user", "users", "User"),
        Field::one_of("type", "Space type", &["global", "team", "personal"])
            .default(Literal::Str("global")),
        Field::one_of("status", "Space status", &["current", "archived"])
            .default(Literal::Str("current")),
    ],
    unique: &["space_key"],
    timestamps: true,
    dependents: &[],
    owned: &[],
};

static PAGE: EntitySpec = EntitySpec {
    collection: "pages",
    label: "Page",
    ids: IdScheme::Sequential,
    id_field: "id",
    id_param: "page_id",
    fields: &[
        Field::reference("space_id", "Space holding the page", "spaces", "Space")
            .required()
            .create_only(),
        Field::text("title", "Page title").required(),
        Field::text("content", "Page body").required(),
        Field::one_of("content_format", "Body format", CONTENT_FORMATS)
            .default(Literal::Str("md")),
        Field::reference("parent_page_id", "Parent page in the same space", "pages", "Page"),
        Field::reference("created_by", "Author", "users", "User")
            .required()
            .create_only(),
        Field::one_of("status", "Page status", &["current", "draft", "archived"])
            .default(Literal::Str("current")),
        Field::integer("version", "Current version number").system(Literal::Int(1)),
        Field::text("last_modified_by", "Last editor").system(Literal::Null),
    ],
    unique: &[],
    timestamps: true,
    dependents: &[Dependent {
        collection: "pages",
        field: "parent_page_id",
        label: "child pages",
        active: Active::Any,
    }],
    owned: &[
        Owned {
            collection: "page_labels",
            field: "page_id",
        },
        Owned {
            collection: "page_versions",
            field: "page_id",
        },
    ],
};

static PAGE_VERSION: EntitySpec = EntitySpec {
    collection: "page_versions",
    label: "Page version",
    ids: IdScheme::Sequential,
    id_field: "id",
    id_param: "version_id",
    fields: &[],
    unique: &[],
    timestamps: false,
    dependents: &[],
    owned: &[],
};

static LABEL: EntitySpec = EntitySpec {
    collection: "labels",
    label: "Label",
    ids: IdScheme::Sequential,
    id_field: "id",
    id_param: "label_id",
    fields: &[
        Field::text("name", "Label text").required(),
        Field::text("color", "Display color"),
    ],
    unique: &["name"],
    timestamps: true,
    dependents: &[],
    owned: &[Owned {
        collection: "page_labels",
        field: "label_id",
    }],
};

static PAGE_LABEL: EntitySpec = EntitySpec {
    collection: "page_labels",
    label: "Page label",
    ids: IdScheme::Sequential,
    id_field: "id",
    id_param: "page_label_id",
    fields: &[
        Field::reference("page_id", "Page", "pages", "Page").required(),
        Field::reference("label_id", "Label", "labels", "Label").required(),
        Field::reference("added_by", "User adding the label", "users", "User"),
    ],
    unique: &[],
    timestamps: true,
    dependents: &[],
    owned: &[],
};

const PAGE_LABELS: LinkSpec = LinkSpec {
    junction: &PAGE_LABEL,
    left: "page_id",
    right: "label_id",
};

const OF_PAGE: ParentRef = ParentRef {
    param: "page_id",
    description: "Page identifier",
    collection: "pages",
    label: "Page",
    field: "page_id",
};

pub fn operations() -> Vec<Operation> {
    vec![
        shapes::get(&USER, "get_user", "Get a wiki user by id."),
        shapes::create(&SPACE, "create_space", "Create a space. Space keys are unique."),
        shapes::get(&SPACE, "get_space", "Get a space by id."),
        shapes::search(
            &SPACE,
            "search_spaces",
            "Search spaces by type, status, owner or name.",
            SearchSpec::equals(&["type", "status", "owner_id", "space_key"])
                .contains(&[("name_contains", &["name"])]),
        ),
        create_page(),
        shapes::get(&PAGE, "get_page", "Get a page by id."),
        shapes::search(
            &PAGE,
            "search_pages",
            "Search pages by space, author, parent, status, title or content.",
            SearchSpec::equals(&["space_id", "created_by", "parent_page_id", "status"])
                .contains(&[
                    ("title_contains", &["title"]),
                    ("content_contains", &["content"]),
                ]),
        ),
        update_page(),
        shapes::delete(
            &PAGE,
            "delete_page",
            "Delete a page without child pages. Its labels and version history are removed with it.",
            &[],
        ),
        shapes::create(&LABEL, "create_label", "Create a label. Names are unique."),
        shapes::link(PAGE_LABELS, "add_label_to_page", "Attach a label to a page."),
        shapes::unlink(PAGE_LABELS, "remove_label_from_page", "Detach a label from a page."),
        list_page_labels(),
        shapes::list_children(
            &PAGE_VERSION,
            "list_page_versions",
            "List a page's version history, newest first.",
            OF_PAGE,
            Some(("version_number", true)),
        ),
    ]
}

fn create_page() -> Operation {
    Operation::new(
        "create_page",
        "Create a page in a space. A parent page must be in the same space and titles are unique within a space. Version 1 is recorded in the history.",
        Effect::Write,
        |ctx, args| {
            let record = build_record(ctx.store, ctx.clock, &PAGE, args)?;
            let space_id = args.id("space_id")?;
            let title = args.str("title")?;
            require_text("title", title)?;
            if let Some(parent_id) = args.opt_id("parent_page_id")? {
                check_parent(ctx, &space_id, &parent_id, None)?;
            }
            check_title(ctx, &space_id, title, None)?;
            let author = args.id("created_by")?;
            let (key, record) = insert_new(ctx, &PAGE, record)?;
            snapshot(ctx, &key, &record, &author)?;
            Ok(Value::Object(record))
        },
    )
    .params(create_params(&PAGE))
}

fn update_page() -> Operation {
    let params = PAGE
        .fields
        .iter()
        .filter(|field| field.is_param_on_update())
        .map(|field| shapes::field_param(field, false));
    Operation::new(
        "update_page",
        "Edit a page. Every edit bumps the version and records a history entry.",
        Effect::Write,
        |ctx, args| {
            let id = args.id("page_id")?;
            let editor = args.id("updated_by")?;
            require_exists(ctx.store, USER.collection, USER.label, &editor)?;
            let page = fetch(ctx.store, &PAGE, &id)?;
            let space_id = page.get("space_id").map(scalar_text).unwrap_or_default();

            let mut patch = Map::new();
            for field in PAGE.fields.iter().filter(|field| field.is_param_on_update()) {
                if let Some(value) = args.value(field.name) {
                    patch.insert(field.name.to_string(), value.clone());
                }
            }
            if patch.is_empty() {
                return Err(ToolError::invalid_argument("No fields provided to update"));
            }
            if let Some(title) = args.opt_str("title")? {
                require_text("title", title)?;
                check_title(ctx, &space_id, title, Some(&id))?;
            }
            if let Some(parent_id) = args.opt_id("parent_page_id")? {
                check_parent(ctx, &space_id, &parent_id, Some(&id))?;
            }
            let version = page.get("version").and_then(Value::as_i64).unwrap_or(1) + 1;
            patch.insert("version".to_string(), json!(version));
            patch.insert("last_modified_by".to_string(), json!(editor));
            let record = shapes::apply_patch(ctx, &PAGE, &id, patch)?;
            snapshot(ctx, &id, &record, &editor)?;
            Ok(Value::Object(record))
        },
    )
    .param(id_param(&PAGE))
    .params(params)
    .param(ParamSpec::required(
        "updated_by",
        ParamType::String,
        "User making the edit",
    ))
}

fn list_page_labels() -> Operation {
    Operation::new(
        "list_page_labels",
        "List the labels attached to a page.",
        Effect::Read,
        |ctx, args| {
            let id = args.id("page_id")?;
            fetch(ctx.store, &PAGE, &id)?;
            let wanted = Value::String(id);
            let filters = Filters::default().equal("page_id", &wanted);
            let labels: Vec<Value> =
                filter_and_match(ctx.store.collection(PAGE_LABEL.collection), &filters)
                    .into_iter()
                    .filter_map(|link| link.get("label_id"))
                    .filter_map(|label| ctx.store.get(LABEL.collection, &scalar_text(label)))
                    .cloned()
                    .map(Value::Object)
                    .collect();
            Ok(Value::Array(labels))
        },
    )
    .param(ParamSpec::required(OF_PAGE.param, ParamType::String, OF_PAGE.description))
}

fn check_parent(ctx: &ToolContext<'_>, space_id: &str, parent_id: &str, page_id: Option<&str>) -> ToolResult<()> {
    if page_id == Some(parent_id) {
        return Err(ToolError::invalid_argument("A page cannot be its own parent"));
    }
    let parent = fetch(ctx.store, &PAGE, parent_id)?;
    let parent_space = parent.get("space_id").map(scalar_text).unwrap_or_default();
    if parent_space != space_id {
        return Err(ToolError::precondition(format!(
            "Parent page {parent_id} is not in space {space_id}"
        )));
    }
    Ok(())
}

fn check_title(ctx: &ToolContext<'_>, space_id: &str, title: &str, page_id: Option<&str>) -> ToolResult<()> {
    let wanted = Value::String(space_id.to_string());
    let filters = Filters::default().equal("space_id", &wanted);
    let taken = filter_and_match(ctx.store.collection(PAGE.collection), &filters)
        .into_iter()
        .filter(|page| page_id.is_none_or(|id| page.get("id").map(scalar_text).as_deref() != Some(id)))
        .any(|page| {
            text(page, "title").is_some_and(|existing| existing.trim().eq_ignore_ascii_case(title.trim()))
        });
    if taken {
        return Err(ToolError::duplicate(format!(
            "A page titled '{title}' already exists in space {space_id}"
        )));
    }
    Ok(())
}

/// Record the page's current content as a history entry.
fn snapshot(ctx: &mut ToolContext<'_>, page_id: &str, page: &Record, author: &str) -> ToolResult<()> {
    let mut version = Map::new();
    set(&mut version, "page_id", page_id);
    for field in ["title", "content", "content_format"] {
        set(&mut version, field, page.get(field).cloned().unwrap_or(Value::Null));
    }
    set(
        &mut version,
        "version_number",
        page.get("version").cloned().unwrap_or(json!(1)),
    );
    set(&mut version, "created_by", author);
    set(&mut version, "created_at", ctx.clock.now());
    insert_new(ctx, &PAGE_VERSION, version)?;
    Ok(())
}
