//! IT incident management: taxonomy, SLA policies, incidents and comments.

use serde_json::{Map, Value};

use crate::catalog::entity::{Active, Dependent, EntitySpec, Field, Literal, Rule};
use crate::catalog::shapes::{
    self, LinkSpec, SearchSpec, SummarySpec, apply_patch, build_record, create_params,
    field_param, fetch, id_param, insert_new,
};
use crate::contract::{Effect, Operation, ParamSpec, ParamType, ToolContext};
use crate::core::error::{ToolError, ToolResult};
use crate::core::filter::{Filters, filter_and_match};
use crate::core::ids::IdScheme;
use crate::core::record::{set, status};
use crate::core::store::{Record, scalar_text};
use crate::core::transitions::INCIDENT;

const PRIORITIES: &[&str] = &["low", "medium", "high", "critical"];

static USER: EntitySpec = EntitySpec {
    collection: "users",
    label: "User",
    ids: IdScheme::Sequential,
    id_field: "id",
    id_param: "user_id",
    fields: &[
        Field::text("name", "Full name").required(),
        Field::text("email", "Email address").required(),
        Field::one_of("role", "Role", &["end_user", "agent", "manager", "admin"]).required(),
        Field::text("department", "Department"),
    ],
    unique: &["email"],
    timestamps: true,
    dependents: &[],
    owned: &[],
};

static CATEGORY: EntitySpec = EntitySpec {
    collection: "categories",
    label: "Category",
    ids: IdScheme::Sequential,
    id_field: "id",
    id_param: "category_id",
    fields: &[
        Field::text("name", "Category name").required(),
        Field::text("description", "What the category covers"),
    ],
    unique: &["name"],
    timestamps: true,
    dependents: &[
        Dependent {
            collection: "subcategories",
            field: "category_id",
            label: "subcategories",
            active: Active::Any,
        },
        Dependent {
            collection: "incidents",
            field: "category_id",
            label: "incidents",
            active: Active::StatusNotIn(&["closed"]),
        },
    ],
    owned: &[],
};

static SUBCATEGORY: EntitySpec = EntitySpec {
    collection: "subcategories",
    label: "Subcategory",
    ids: IdScheme::Sequential,
    id_field: "id",
    id_param: "subcategory_id",
    fields: &[
        Field::reference("category_id", "Parent category", "categories", "Category").required(),
        Field::text("name", "Subcategory name").required(),
        Field::text("description", "What the subcategory covers"),
    ],
    unique: &[],
    timestamps: true,
    dependents: &[],
    owned: &[],
};

static SLA_POLICY: EntitySpec = EntitySpec {
    collection: "sla_policies",
    label: "SLA policy",
    ids: IdScheme::Sequential,
    id_field: "id",
    id_param: "sla_id",
    fields: &[
        Field::text("name", "Policy name").required(),
        Field::one_of("priority", "Incident priority covered", PRIORITIES).required(),
        Field::integer("response_time", "Minutes to first response")
            .rule(Rule::Positive)
            .required(),
        Field::integer("resolve_time", "Minutes to resolution")
            .rule(Rule::Positive)
            .required(),
        Field::boolean("active", "Whether the policy applies").default(Literal::Bool(true)),
    ],
    unique: &["name"],
    timestamps: true,
    dependents: &[],
    owned: &[],
};

static INCIDENT_SPEC: EntitySpec = EntitySpec {
    collection: "incidents",
    label: "Incident",
    ids: IdScheme::Prefixed {
        prefix: "INC_",
        width: 0,
    },
    id_field: "incident_id",
    id_param: "incident_id",
    fields: &[
        Field::text("title", "Short summary").required(),
        Field::text("description", "Details"),
        Field::one_of("priority", "Priority", PRIORITIES).required(),
        Field::reference("category_id", "Category", "categories", "Category"),
        Field::reference("subcategory_id", "Subcategory", "subcategories", "Subcategory"),
        Field::reference("reported_by", "Reporting user", "users", "User")
            .required()
            .create_only(),
        Field::reference("assigned_to", "Assigned agent", "users", "User"),
        Field::one_of("status", "Status", &["open", "in_progress", "resolved", "closed"])
            .system(Literal::Str("open")),
        Field::text("resolved_at", "Resolution timestamp").system(Literal::Null),
        Field::text("closed_at", "Closing timestamp").system(Literal::Null),
    ],
    unique: &[],
    timestamps: true,
    dependents: &[],
    owned: &[],
};

static INCIDENT_SLA: EntitySpec = EntitySpec {
    collection: "incident_slas",
    label: "Incident SLA",
    ids: IdScheme::Sequential,
    id_field: "id",
    id_param: "incident_sla_id",
    fields: &[
        Field::reference("incident_id", "Incident", "incidents", "Incident").required(),
        Field::reference("sla_id", "SLA policy", "sla_policies", "SLA policy").required(),
    ],
    unique: &[],
    timestamps: true,
    dependents: &[],
    owned: &[],
};

static COMMENT: EntitySpec = EntitySpec {
    collection: "incident_comments",
    label: "Comment",
    ids: IdScheme::Sequential,
    id_field: "id",
    id_param: "comment_id",
    fields: &[
        Field::reference("incident_id", "Incident", "incidents", "Incident").required(),
        Field::reference("author_id", "Author", "users", "User").required(),
        Field::text("comment_text", "Comment body").required(),
        Field::boolean("is_public", "Visible to the reporter").default(Literal::Bool(true)),
    ],
    unique: &[],
    timestamps: true,
    dependents: &[],
    owned: &[],
};

const INCIDENT_SLAS: LinkSpec = LinkSpec {
    junction: &INCIDENT_SLA,
    left: "incident_id",
    right: "sla_id",
};

pub fn operations() -> Vec<Operation> {
    vec![
        shapes::get(&USER, "get_user", "Get a user by id."),
        shapes::search(
            &USER,
            "search_users",
            "Search users by role, department, name or email.",
            SearchSpec::equals(&["role", "department"])
                .contains(&[("name_contains", &["name"]), ("email_contains", &["email"])]),
        ),
        shapes::create(&CATEGORY, "create_category", "Create an incident category. Names are unique."),
        shapes::search(
            &CATEGORY,
            "list_categories",
            "List incident categories, optionally by name.",
            SearchSpec::equals(&[]).contains(&[("name_contains", &["name"])]),
        ),
        shapes::delete(
            &CATEGORY,
            "delete_category",
            "Delete a category with no subcategories and no incidents that are not closed.",
            &[],
        ),
        shapes::create(&SUBCATEGORY, "create_subcategory", "Create a subcategory under a category."),
        shapes::search(
            &SUBCATEGORY,
            "list_subcategories",
            "List subcategories, optionally of one category.",
            SearchSpec::equals(&["category_id"]),
        ),
        create_sla_policy(),
        shapes::search(
            &SLA_POLICY,
            "list_sla_policies",
            "List SLA policies, optionally by priority or active flag.",
            SearchSpec::equals(&["priority", "active"]),
        ),
        create_incident(),
        get_incident(),
        shapes::search(
            &INCIDENT_SPEC,
            "search_incidents",
            "Search incidents by category, subcategory, priority, status, reporter, assignee or title.",
            SearchSpec::equals(&[
                "category_id",
                "subcategory_id",
                "priority",
                "status",
                "reported_by",
                "assigned_to",
            ])
            .contains(&[("title_contains", &["title"])]),
        ),
        update_incident(),
        update_incident_status(),
        shapes::link(INCIDENT_SLAS, "add_sla_to_incident", "Attach an SLA policy to an incident."),
        shapes::unlink(
            INCIDENT_SLAS,
            "remove_sla_from_incident",
            "Detach an SLA policy from an incident.",
        ),
        record_incident_comment(),
        shapes::summarize(
            &INCIDENT_SPEC,
            "summarize_incidents",
            "Count incidents by priority, optionally filtered by status or category.",
            SummarySpec {
                group_by: "priority",
                sums: &[],
                filters: &["status", "category_id"],
            },
        ),
    ]
}

fn create_sla_policy() -> Operation {
    Operation::new(
        "create_sla_policy",
        "Create an SLA policy. The resolve time must be at least the response time (both in minutes).",
        Effect::Write,
        |ctx, args| {
            let record = build_record(ctx.store, ctx.clock, &SLA_POLICY, args)?;
            if args.i64("resolve_time")? < args.i64("response_time")? {
                return Err(ToolError::invalid_argument(
                    "resolve_time must not be less than response_time",
                ));
            }
            let (_, record) = insert_new(ctx, &SLA_POLICY, record)?;
            Ok(Value::Object(record))
        },
    )
    .params(create_params(&SLA_POLICY))
}

fn create_incident() -> Operation {
    Operation::new(
        "create_incident",
        "Open an incident. A subcategory must belong to the given category.",
        Effect::Write,
        |ctx, args| {
            let record = build_record(ctx.store, ctx.clock, &INCIDENT_SPEC, args)?;
            check_taxonomy(ctx, &record)?;
            let (_, record) = insert_new(ctx, &INCIDENT_SPEC, record)?;
            Ok(Value::Object(record))
        },
    )
    .params(create_params(&INCIDENT_SPEC))
}

fn get_incident() -> Operation {
    Operation::new(
        "get_incident",
        "Get an incident with its category, subcategory, attached SLA policies and comments.",
        Effect::Read,
        |ctx, args| {
            let id = args.id("incident_id")?;
            let mut incident = fetch(ctx.store, &INCIDENT_SPEC, &id)?;
            let join = |collection: &str, field: &str| {
                incident
                    .get(field)
                    .filter(|value| !value.is_null())
                    .and_then(|value| ctx.store.get(collection, &scalar_text(value)))
                    .cloned()
                    .map_or(Value::Null, Value::Object)
            };
            let category = join(CATEGORY.collection, "category_id");
            let subcategory = join(SUBCATEGORY.collection, "subcategory_id");

            let wanted = Value::String(id.clone());
            let by_incident = Filters::default().equal("incident_id", &wanted);
            let slas: Vec<Value> =
                filter_and_match(ctx.store.collection(INCIDENT_SLA.collection), &by_incident)
                    .into_iter()
                    .filter_map(|link| link.get("sla_id"))
                    .filter_map(|sla| ctx.store.get(SLA_POLICY.collection, &scalar_text(sla)))
                    .cloned()
                    .map(Value::Object)
                    .collect();
            let comments: Vec<Value> =
                filter_and_match(ctx.store.collection(COMMENT.collection), &by_incident)
                    .into_iter()
                    .cloned()
                    .map(Value::Object)
                    .collect();

            set(&mut incident, "category", category);
            set(&mut incident, "subcategory", subcategory);
            set(&mut incident, "sla_policies", slas);
            set(&mut incident, "comments", comments);
            Ok(Value::Object(incident))
        },
    )
    .param(id_param(&INCIDENT_SPEC))
}

fn update_incident() -> Operation {
    let params = INCIDENT_SPEC
        .fields
        .iter()
        .filter(|field| field.is_param_on_update())
        .map(|field| field_param(field, false));
    Operation::new(
        "update_incident",
        "Update an incident's title, description, priority, category, subcategory or assignee.",
        Effect::Write,
        |ctx, args| {
            let id = args.id("incident_id")?;
            let current = fetch(ctx.store, &INCIDENT_SPEC, &id)?;
            if status(&current) == "closed" {
                return Err(ToolError::precondition(format!(
                    "Incident {id} is closed and cannot be updated"
                )));
            }
            let mut patch = Map::new();
            for field in INCIDENT_SPEC.fields.iter().filter(|field| field.is_param_on_update()) {
                if let Some(value) = args.value(field.name) {
                    patch.insert(field.name.to_string(), value.clone());
                }
            }
            if patch.is_empty() {
                return Err(ToolError::invalid_argument("No fields provided to update"));
            }
            let record = apply_patch(ctx, &INCIDENT_SPEC, &id, patch)?;
            check_taxonomy(ctx, &record)?;
            Ok(Value::Object(record))
        },
    )
    .param(id_param(&INCIDENT_SPEC))
    .params(params)
}

fn update_incident_status() -> Operation {
    Operation::new(
        "update_incident_status",
        "Move an incident through open -> in_progress -> resolved -> closed. A resolved incident may be reopened to in_progress.",
        Effect::Write,
        |ctx, args| {
            let id = args.id("incident_id")?;
            let target = args.str("status")?;
            shapes::transition(ctx, &INCIDENT_SPEC, INCIDENT, &id, target)?;
            let now = ctx.clock.now().to_string();
            let incident = ctx
                .store
                .get_mut(INCIDENT_SPEC.collection, &id)
                .ok_or_else(|| INCIDENT_SPEC.not_found(&id))?;
            match target {
                "resolved" => set(incident, "resolved_at", now),
                "closed" => set(incident, "closed_at", now),
                "in_progress" => set(incident, "resolved_at", Value::Null),
                _ => {}
            }
            Ok(Value::Object(incident.clone()))
        },
    )
    .param(id_param(&INCIDENT_SPEC))
    .param(
        ParamSpec::required("status", ParamType::String, "Target status")
            .one_of(&INCIDENT.states()),
    )
}

fn record_incident_comment() -> Operation {
    Operation::new(
        "record_incident_comment",
        "Add a comment to an incident that is not closed.",
        Effect::Write,
        |ctx, args| {
            let record = build_record(ctx.store, ctx.clock, &COMMENT, args)?;
            let incident_id = args.id("incident_id")?;
            let incident = fetch(ctx.store, &INCIDENT_SPEC, &incident_id)?;
            if status(&incident) == "closed" {
                return Err(ToolError::precondition(format!(
                    "Incident {incident_id} is closed"
                )));
            }
            let (_, record) = insert_new(ctx, &COMMENT, record)?;
            Ok(Value::Object(record))
        },
    )
    .params(create_params(&COMMENT))
}

/// A subcategory must sit under the incident's category.
fn check_taxonomy(ctx: &ToolContext<'_>, incident: &Record) -> ToolResult<()> {
    let present = |field: &str| {
        incident
            .get(field)
            .filter(|value| !value.is_null())
            .map(scalar_text)
    };
    let (Some(category_id), Some(subcategory_id)) =
        (present("category_id"), present("subcategory_id"))
    else {
        return Ok(());
    };
    let subcategory = fetch(ctx.store, &SUBCATEGORY, &subcategory_id)?;
    let parent = subcategory
        .get("category_id")
        .map(scalar_text)
        .unwrap_or_default();
    if parent != category_id {
        return Err(ToolError::precondition(format!(
            "Subcategory {subcategory_id} does not belong to category {category_id}"
        )));
    }
    Ok(())
}
