//! Standard operation shapes, implemented once over [`EntitySpec`].
//!
//! Each constructor returns a ready [`Operation`]; domains pick a name and,
//! where needed, override the failure surface. The `pub fn` helpers at the
//! bottom are the building blocks domain-specific handlers reuse.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde_json::{Map, Value, json};

use crate::catalog::entity::{Access, EntitySpec, Field, Presence};
use crate::contract::{Effect, FailMode, Operation, ParamSpec, ParamType, ToolContext};
use crate::core::args::Args;
use crate::core::clock::Clock;
use crate::core::error::{ToolError, ToolResult};
use crate::core::filter::{Filters, filter_and_match};
use crate::core::ids::stamp_identity;
use crate::core::record::{lookup, money};
use crate::core::store::{Record, Store, compare_values, scalar_text};
use crate::core::transitions::Lifecycle;
use crate::core::validate::{require_approvals, require_enum, require_exists, require_unique};

/// Search parameters beyond plain equality.
#[derive(Debug, Clone, Copy)]
pub struct SearchSpec {
    /// Fields filterable by equality; each becomes an optional parameter.
    pub equals: &'static [&'static str],
    /// `(parameter, fields)`: case-insensitive partial match over any field.
    pub contains: &'static [(&'static str, &'static [&'static str])],
    /// `(field, descending)`.
    pub sort: Option<(&'static str, bool)>,
}

impl SearchSpec {
    pub const fn equals(equals: &'static [&'static str]) -> Self {
        Self {
            equals,
            contains: &[],
            sort: None,
        }
    }

    pub const fn contains(mut self, contains: &'static [(&'static str, &'static [&'static str])]) -> Self {
        self.contains = contains;
        self
    }

    pub const fn sort(mut self, field: &'static str, descending: bool) -> Self {
        self.sort = Some((field, descending));
        self
    }
}

/// A junction entity joining two references.
#[derive(Debug, Clone, Copy)]
pub struct LinkSpec {
    pub junction: &'static EntitySpec,
    pub left: &'static str,
    pub right: &'static str,
}

/// Group-by aggregation.
#[derive(Debug, Clone, Copy)]
pub struct SummarySpec {
    pub group_by: &'static str,
    /// `(output key, dotted numeric path)`.
    pub sums: &'static [(&'static str, &'static str)],
    /// Optional equality filters, as in [`SearchSpec::equals`].
    pub filters: &'static [&'static str],
}

pub fn create(spec: &'static EntitySpec, name: &'static str, description: &str) -> Operation {
    let params = create_params(spec);
    Operation::new(name, description, Effect::Write, move |ctx, args| {
        let record = build_record(ctx.store, ctx.clock, spec, args)?;
        let (_, record) = insert_new(ctx, spec, record)?;
        Ok(Value::Object(record))
    })
    .params(params)
}

pub fn get(spec: &'static EntitySpec, name: &'static str, description: &str) -> Operation {
    Operation::new(name, description, Effect::Read, move |ctx, args| {
        let id = args.id(spec.id_param)?;
        Ok(Value::Object(fetch(ctx.store, spec, &id)?))
    })
    .param(id_param(spec))
}

pub fn update(spec: &'static EntitySpec, name: &'static str, description: &str) -> Operation {
    let params = spec
        .fields
        .iter()
        .filter(|field| field.is_param_on_update())
        .map(|field| field_param(field, false));
    Operation::new(name, description, Effect::Write, move |ctx, args| {
        let id = args.id(spec.id_param)?;
        fetch(ctx.store, spec, &id)?;
        let mut patch = Map::new();
        for field in spec.fields.iter().filter(|field| field.is_param_on_update()) {
            if let Some(value) = args.value(field.name) {
                patch.insert(field.name.to_string(), value.clone());
            }
        }
        if patch.is_empty() {
            return Err(ToolError::invalid_argument("No fields provided to update"));
        }
        let record = apply_patch(ctx, spec, &id, patch)?;
        Ok(Value::Object(record))
    })
    .param(id_param(spec))
    .params(params)
}

/// `field_name` + `field_value` update restricted to `allowed` fields.
pub fn update_field(
    spec: &'static EntitySpec,
    name: &'static str,
    description: &str,
    allowed: &'static [&'static str],
) -> Operation {
    Operation::new(name, description, Effect::Write, move |ctx, args| {
        let id = args.id(spec.id_param)?;
        let field_name = args.str("field_name")?;
        require_enum(field_name, allowed, "field_name")?;
        let field = spec
            .field(field_name)
            .ok_or_else(|| ToolError::invalid_argument(format!("Unknown field {field_name}")))?;
        let value = args
            .value("field_value")
            .ok_or_else(|| ToolError::invalid_argument("Missing required argument: field_value"))?;
        fetch(ctx.store, spec, &id)?;
        let mut patch = Map::new();
        patch.insert(field.name.to_string(), value.clone());
        let record = apply_patch(ctx, spec, &id, patch)?;
        Ok(Value::Object(record))
    })
    .param(id_param(spec))
    .param(
        ParamSpec::required("field_name", ParamType::String, "Field to change").one_of(allowed),
    )
    .param(ParamSpec::required(
        "field_value",
        ParamType::Any,
        "New value for the field",
    ))
}

pub fn search(
    spec: &'static EntitySpec,
    name: &'static str,
    description: &str,
    search: SearchSpec,
) -> Operation {
    let mut params = equality_params(spec, search.equals);
    for (param, fields) in search.contains {
        params.push(ParamSpec::optional(
            *param,
            ParamType::String,
            format!("Case-insensitive partial match on {}", fields.join(" or ")),
        ));
    }
    Operation::new(name, description, Effect::Read, move |ctx, args| {
        let mut filters = equality_filters(args, search.equals);
        for (param, fields) in search.contains {
            if let Some(needle) = args.opt_str(param)? {
                filters = filters.containing(fields, needle);
            }
        }
        let mut found: Vec<&Record> = filter_and_match(ctx.store.collection(spec.collection), &filters);
        if let Some((field, descending)) = search.sort {
            sort_records(&mut found, field, descending);
        }
        Ok(Value::Array(
            found.into_iter().cloned().map(Value::Object).collect(),
        ))
    })
    .params(params)
}

/// List every record of `parent`'s children: `children.field == parent id`.
pub fn list_children(
    spec: &'static EntitySpec,
    name: &'static str,
    description: &str,
    parent: ParentRef,
    sort: Option<(&'static str, bool)>,
) -> Operation {
    Operation::new(name, description, Effect::Read, move |ctx, args| {
        let id = args.id(parent.param)?;
        require_exists(ctx.store, parent.collection, parent.label, &id)?;
        let wanted = Value::String(id);
        let filters = Filters::default().equal(parent.field, &wanted);
        let mut found = filter_and_match(ctx.store.collection(spec.collection), &filters);
        if let Some((field, descending)) = sort {
            sort_records(&mut found, field, descending);
        }
        Ok(Value::Array(
            found.into_iter().cloned().map(Value::Object).collect(),
        ))
    })
    .param(ParamSpec::required(parent.param, ParamType::String, parent.description))
}

/// The owning side of a one-to-many relation.
#[derive(Debug, Clone, Copy)]
pub struct ParentRef {
    pub param: &'static str,
    pub description: &'static str,
    pub collection: &'static str,
    pub label: &'static str,
    /// Field on the child pointing at the parent.
    pub field: &'static str,
}

/// Remove a record after approvals and an active-dependent scan.
///
/// Approval flags are optional booleans so that a missing flag reaches the
/// approval check instead of failing argument validation.
pub fn delete(
    spec: &'static EntitySpec,
    name: &'static str,
    description: &str,
    approvals: &'static [&'static str],
) -> Operation {
    let approval_params = approvals.iter().map(|flag| approval_param(flag));
    Operation::new(name, description, Effect::Write, move |ctx, args| {
        check_approvals(args, approvals)?;
        let id = args.id(spec.id_param)?;
        fetch(ctx.store, spec, &id)?;
        check_dependents(ctx.store, spec, &id)?;
        remove_with_owned(ctx.store, spec, &id);
        Ok(json!({ "success": true, spec.id_param: id }))
    })
    .param(id_param(spec))
    .params(approval_params)
    .fail_mode(if approvals.is_empty() {
        FailMode::Raise
    } else {
        FailMode::Error
    })
}

/// Insert a junction row after checking both endpoints and the pair.
pub fn link(link: LinkSpec, name: &'static str, description: &str) -> Operation {
    let spec = link.junction;
    let params = create_params(spec);
    Operation::new(name, description, Effect::Write, move |ctx, args| {
        let left = args.id(link.left)?;
        let right = args.id(link.right)?;
        let record = build_record(ctx.store, ctx.clock, spec, args)?;
        if find_link(ctx.store, link, &left, &right).is_some() {
            return Err(ToolError::duplicate(format!(
                "{} with {} {left} and {} {right} already exists",
                spec.label, link.left, link.right
            )));
        }
        let (_, record) = insert_new(ctx, spec, record)?;
        Ok(Value::Object(record))
    })
    .params(params)
}

/// Remove the junction row for a pair; NotFound when absent.
pub fn unlink(link: LinkSpec, name: &'static str, description: &str) -> Operation {
    let left_description = link.junction.field(link.left).map_or("", |field| field.description);
    let right_description = link.junction.field(link.right).map_or("", |field| field.description);
    Operation::new(name, description, Effect::Write, move |ctx, args| {
        let left = args.id(link.left)?;
        let right = args.id(link.right)?;
        let key = find_link(ctx.store, link, &left, &right).ok_or_else(|| {
            ToolError::not_found(
                link.junction.label,
                &format!("for {} {left} and {} {right}", link.left, link.right),
            )
        })?;
        ctx.store.remove(link.junction.collection, &key);
        Ok(json!({ "success": true, link.left: left, link.right: right }))
    })
    .param(ParamSpec::required(link.left, ParamType::String, left_description))
    .param(ParamSpec::required(link.right, ParamType::String, right_description))
}

/// Counts and sums grouped by one field, sorted by group key.
pub fn summarize(
    spec: &'static EntitySpec,
    name: &'static str,
    description: &str,
    summary: SummarySpec,
) -> Operation {
    Operation::new(name, description, Effect::Read, move |ctx, args| {
        let filters = equality_filters(args, summary.filters);
        let found = filter_and_match(ctx.store.collection(spec.collection), &filters);
        let mut groups: BTreeMap<String, (u64, Vec<f64>)> = BTreeMap::new();
        for record in found {
            let key = record
                .get(summary.group_by)
                .filter(|value| !value.is_null())
                .map(scalar_text)
                .unwrap_or_else(|| "unknown".to_string());
            let entry = groups
                .entry(key)
                .or_insert_with(|| (0, vec![0.0; summary.sums.len()]));
            entry.0 += 1;
            for (slot, (_, path)) in entry.1.iter_mut().zip(summary.sums) {
                *slot += lookup(record, path).and_then(Value::as_f64).unwrap_or(0.0);
            }
        }
        let rows = groups
            .into_iter()
            .map(|(key, (count, sums))| {
                let mut row = Map::new();
                row.insert(summary.group_by.to_string(), json!(key));
                row.insert("count".to_string(), json!(count));
                for ((output, _), total) in summary.sums.iter().zip(sums) {
                    row.insert((*output).to_string(), json!(money(total)));
                }
                Value::Object(row)
            })
            .collect();
        Ok(Value::Array(rows))
    })
    .params(equality_params(spec, summary.filters))
}

/// Move a record to the status named by the `status_param` argument.
pub fn update_status(
    spec: &'static EntitySpec,
    name: &'static str,
    description: &str,
    lifecycle: Lifecycle,
    status_param: &'static str,
) -> Operation {
    let states = lifecycle.states();
    Operation::new(name, description, Effect::Write, move |ctx, args| {
        let id = args.id(spec.id_param)?;
        let target = args.str(status_param)?;
        let record = transition(ctx, spec, lifecycle, &id, target)?;
        Ok(Value::Object(record))
    })
    .param(id_param(spec))
    .param(ParamSpec::required(status_param, ParamType::String, "Target status").one_of(&states))
}

/// Move a record to a fixed `target` status behind approval flags.
pub fn advance(
    spec: &'static EntitySpec,
    name: &'static str,
    description: &str,
    lifecycle: Lifecycle,
    target: &'static str,
    approvals: &'static [&'static str],
) -> Operation {
    let approval_params = approvals.iter().map(|flag| approval_param(flag));
    Operation::new(name, description, Effect::Write, move |ctx, args| {
        check_approvals(args, approvals)?;
        let id = args.id(spec.id_param)?;
        let record = transition(ctx, spec, lifecycle, &id, target)?;
        Ok(Value::Object(record))
    })
    .param(id_param(spec))
    .params(approval_params)
    .fail_mode(if approvals.is_empty() {
        FailMode::Raise
    } else {
        FailMode::Error
    })
}

// Building blocks for domain handlers.

pub fn id_param(spec: &EntitySpec) -> ParamSpec {
    ParamSpec::required(
        spec.id_param,
        ParamType::String,
        format!("{} identifier", spec.label),
    )
}

pub fn approval_param(flag: &str) -> ParamSpec {
    ParamSpec::optional(
        flag,
        ParamType::Boolean,
        "Approval flag; must be true for the operation to proceed",
    )
}

/// Parameters accepted on create: every non-system field.
pub fn create_params(spec: &EntitySpec) -> Vec<ParamSpec> {
    spec.fields
        .iter()
        .filter(|field| field.is_param_on_create())
        .map(|field| field_param(field, field.presence == Presence::Required))
        .collect()
}

pub fn field_param(field: &Field, required: bool) -> ParamSpec {
    let mut param = if required {
        ParamSpec::required(field.name, field.ty, field.description)
    } else {
        ParamSpec::optional(field.name, field.ty, field.description)
    };
    param.allowed = field.allowed().map(<[_]>::to_vec);
    param
}

/// Optional parameters for spec fields used as equality filters.
pub fn equality_params(spec: &EntitySpec, fields: &[&str]) -> Vec<ParamSpec> {
    fields
        .iter()
        .map(|name| match spec.field(name) {
            Some(field) => field_param(field, false),
            None => ParamSpec::optional(*name, ParamType::String, format!("Filter by {name}")),
        })
        .collect()
}

fn equality_filters<'a>(args: &Args<'a>, fields: &'static [&'static str]) -> Filters<'a> {
    let mut filters = Filters::default();
    for field in fields {
        if let Some(value) = args.value(field) {
            filters = filters.equal(field, value);
        }
    }
    filters
}

pub fn check_approvals(args: &Args<'_>, approvals: &[&str]) -> ToolResult<()> {
    let flags: Vec<(&str, Option<bool>)> = approvals.iter().map(|flag| (*flag, args.flag(flag))).collect();
    require_approvals(&flags)
}

/// Clone of `spec[id]`, or NotFound.
pub fn fetch(store: &Store, spec: &EntitySpec, id: &str) -> ToolResult<Record> {
    store
        .get(spec.collection, id)
        .cloned()
        .ok_or_else(|| spec.not_found(id))
}

/// New record from create parameters: validated, defaulted, not yet stored.
pub fn build_record(store: &Store, clock: &Clock, spec: &EntitySpec, args: &Args<'_>) -> ToolResult<Record> {
    let mut record = Map::new();
    for field in spec.fields {
        let provided = if field.access == Access::System {
            None
        } else {
            args.value(field.name)
        };
        let value = match (provided, field.presence) {
            (Some(value), _) => value.clone(),
            (None, Presence::Required) => {
                return Err(ToolError::invalid_argument(format!(
                    "Missing required argument: {}",
                    field.name
                )));
            }
            (None, Presence::Default(literal)) => literal.resolve(clock),
            (None, Presence::Optional) => Value::Null,
        };
        field.check(store, &value)?;
        record.insert(field.name.to_string(), value);
    }
    for name in spec.unique {
        if let Some(value) = record.get(*name).filter(|value| !value.is_null()) {
            require_unique(store, spec.collection, name, value, None)?;
        }
    }
    Ok(record)
}

/// Allocate an id, stamp identity and timestamps, insert. Returns `(key, record)`.
pub fn insert_new(ctx: &mut ToolContext<'_>, spec: &EntitySpec, mut record: Record) -> ToolResult<(String, Record)> {
    let key = spec
        .ids
        .allocate(ctx.store.collection(spec.collection), ctx.clock);
    stamp_identity(&mut record, spec.id_field, spec.ids, &key);
    if spec.timestamps {
        record.insert("created_at".to_string(), json!(ctx.clock.now()));
        record.insert("updated_at".to_string(), json!(ctx.clock.now()));
    }
    ctx.store.insert(spec.collection, key.clone(), record.clone());
    Ok((key, record))
}

/// Validate and apply `patch` to `spec[id]`, bump `updated_at`.
pub fn apply_patch(
    ctx: &mut ToolContext<'_>,
    spec: &EntitySpec,
    id: &str,
    patch: Map<String, Value>,
) -> ToolResult<Record> {
    for (name, value) in &patch {
        if let Some(field) = spec.field(name) {
            field.check(ctx.store, value)?;
        }
        if spec.unique.contains(&name.as_str()) && !value.is_null() {
            require_unique(ctx.store, spec.collection, name, value, Some(id))?;
        }
    }
    let clock = ctx.clock;
    let record = ctx
        .store
        .get_mut(spec.collection, id)
        .ok_or_else(|| spec.not_found(id))?;
    record.extend(patch);
    if spec.timestamps {
        touch(record, clock);
    }
    Ok(record.clone())
}

pub fn touch(record: &mut Record, clock: &Clock) {
    record.insert("updated_at".to_string(), json!(clock.now()));
}

/// Check `lifecycle` and set `status`; bumps `updated_at`.
pub fn transition(
    ctx: &mut ToolContext<'_>,
    spec: &EntitySpec,
    lifecycle: Lifecycle,
    id: &str,
    target: &str,
) -> ToolResult<Record> {
    let current = fetch(ctx.store, spec, id)?;
    let from = current.get("status").and_then(Value::as_str).unwrap_or("");
    lifecycle.check(from, target)?;
    let clock = ctx.clock;
    let record = ctx
        .store
        .get_mut(spec.collection, id)
        .ok_or_else(|| spec.not_found(id))?;
    record.insert("status".to_string(), json!(target));
    touch(record, clock);
    Ok(record.clone())
}

/// Fail when any active dependent references `spec[id]`.
pub fn check_dependents(store: &Store, spec: &EntitySpec, id: &str) -> ToolResult<()> {
    let wanted = Value::String(id.to_string());
    for dependent in spec.dependents {
        let filters = Filters::default().equal(dependent.field, &wanted);
        let active = filter_and_match(store.collection(dependent.collection), &filters)
            .into_iter()
            .filter(|record| dependent.active.matches(record))
            .count();
        if active > 0 {
            return Err(ToolError::precondition(format!(
                "Cannot delete {} {id}: {active} active {} still reference it",
                spec.label.to_lowercase(),
                dependent.label
            )));
        }
    }
    Ok(())
}

/// Remove `spec[id]` and every owned junction row pointing at it.
pub fn remove_with_owned(store: &mut Store, spec: &EntitySpec, id: &str) {
    store.remove(spec.collection, id);
    let wanted = Value::String(id.to_string());
    for owned in spec.owned {
        let filters = Filters::default().equal(owned.field, &wanted);
        let keys: Vec<String> = store
            .collection(owned.collection)
            .map(|collection| {
                collection
                    .ordered()
                    .into_iter()
                    .filter(|(_, record)| filters.matches(record))
                    .map(|(key, _)| key.to_string())
                    .collect()
            })
            .unwrap_or_default();
        for key in keys {
            store.remove(owned.collection, &key);
        }
    }
}

fn find_link(store: &Store, link: LinkSpec, left: &str, right: &str) -> Option<String> {
    let left = Value::String(left.to_string());
    let right = Value::String(right.to_string());
    let filters = Filters::default()
        .equal(link.left, &left)
        .equal(link.right, &right);
    store.collection(link.junction.collection).and_then(|collection| {
        collection
            .ordered()
            .into_iter()
            .find(|(_, record)| filters.matches(record))
            .map(|(key, _)| key.to_string())
    })
}

/// Stable sort by `field`; missing values sort last in either direction.
pub fn sort_records(records: &mut [&Record], field: &str, descending: bool) {
    records.sort_by(|left, right| {
        let (left, right) = (left.get(field), right.get(field));
        let present = |value: Option<&Value>| value.is_some_and(|value| !value.is_null());
        match (present(left), present(right)) {
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            _ if descending => compare_values(right, left),
            _ => compare_values(left, right),
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::entity::{Active, Dependent, Literal, Owned};
    use crate::contract::Tool;
    use crate::core::error::ErrorKind;
    use crate::core::ids::IdScheme;
    use crate::core::record::from_value;
    use crate::core::transitions::COMMITMENT;

    static TEAM: EntitySpec = EntitySpec {
        collection: "teams",
        label: "Team",
        ids: IdScheme::Sequential,
        id_field: "id",
        id_param: "team_id",
        fields: &[
            Field::text("name", "Team name").required(),
            Field::one_of("tier", "Tier", &["gold", "silver"]).default(Literal::Str("silver")),
            Field::text("code", "Short code").create_only(),
            Field::one_of("status", "Status", &["pending", "approved", "fulfilled", "rejected"])
                .system(Literal::Str("pending")),
        ],
        unique: &["name"],
        timestamps: true,
        dependents: &[Dependent {
            collection: "members",
            field: "team_id",
            label: "members",
            active: Active::StatusNotIn(&["left"]),
        }],
        owned: &[Owned {
            collection: "team_tags",
            field: "team_id",
        }],
    };

    static TEAM_TAG: EntitySpec = EntitySpec {
        collection: "team_tags",
        label: "Team tag",
        ids: IdScheme::Sequential,
        id_field: "id",
        id_param: "team_tag_id",
        fields: &[
            Field::reference("team_id", "Team", "teams", "Team").required(),
            Field::text("tag", "Tag").required(),
        ],
        unique: &[],
        timestamps: false,
        dependents: &[],
        owned: &[],
    };

    const TAGS: LinkSpec = LinkSpec {
        junction: &TEAM_TAG,
        left: "team_id",
        right: "tag",
    };

    fn clock() -> Clock {
        Clock::fixed("2025-01-01T00:00:00Z").expect("clock")
    }

    fn tool(operation: Operation) -> Tool {
        Tool::new(operation.name.to_string(), operation).expect("tool")
    }

    fn store() -> Store {
        let mut store = Store::new();
        store.insert(
            "teams",
            "4",
            from_value(json!({ "id": 4, "name": "Core", "tier": "gold", "status": "pending" })),
        );
        store
    }

    fn call(tool: &Tool, store: &mut Store, kwargs: Value) -> Result<Value, ToolError> {
        let body = tool.invoke(store, &clock(), &kwargs)?;
        Ok(serde_json::from_str(&body).expect("json body"))
    }

    #[test]
    fn create_allocates_defaults_and_stamps() {
        let create = tool(create(&TEAM, "create_team", "Create a team"));
        let mut store = store();
        let record = call(&create, &mut store, json!({ "name": "Edge" })).expect("create");
        assert_eq!(record["id"], 5);
        assert_eq!(record["tier"], "silver");
        assert_eq!(record["status"], "pending");
        assert_eq!(record["code"], Value::Null);
        assert_eq!(record["created_at"], "2025-01-01T00:00:00Z");
        assert!(store.get("teams", "5").is_some());

        let err = call(&create, &mut store, json!({ "name": "core" })).expect_err("duplicate");
        assert_eq!(err.kind, ErrorKind::DuplicateKey);
        let err = call(&create, &mut store, json!({ "name": "X", "tier": "bronze" })).expect_err("enum");
        assert_eq!(err.message, "Invalid tier. Must be one of [gold, silver]");
        let err = call(&create, &mut store, json!({ "name": "X", "status": "approved" }))
            .expect_err("system fields are not parameters");
        assert_eq!(err.kind, ErrorKind::InvalidArgument);
    }

    #[test]
    fn update_patches_only_writable_fields() {
        let update = tool(update(&TEAM, "update_team", "Update a team"));
        let mut store = store();
        let record = call(&update, &mut store, json!({ "team_id": "4", "tier": "silver" })).expect("update");
        assert_eq!(record["tier"], "silver");
        assert_eq!(record["name"], "Core");
        assert_eq!(record["updated_at"], "2025-01-01T00:00:00Z");
        let err = call(&update, &mut store, json!({ "team_id": "4", "code": "C" })).expect_err("create only");
        assert_eq!(err.kind, ErrorKind::InvalidArgument);
        let err = call(&update, &mut store, json!({ "team_id": "4" })).expect_err("empty patch");
        assert_eq!(err.message, "No fields provided to update");
        let err = call(&update, &mut store, json!({ "team_id": "9", "tier": "gold" })).expect_err("missing");
        assert_eq!(err.message, "Team 9 not found");
    }

    #[test]
    fn delete_checks_approvals_dependents_and_cascades() {
        let delete = tool(delete(&TEAM, "delete_team", "Delete a team", &["manager_approval"]));
        let mut store = store();
        store.insert("members", "1", from_value(json!({ "team_id": "4", "status": "active" })));
        store.insert("team_tags", "1", from_value(json!({ "id": 1, "team_id": "4", "tag": "x" })));

        let body = delete
            .invoke(&mut store, &clock(), &json!({ "team_id": "4" }))
            .expect("envelope");
        assert!(body.contains("manager_approval"));

        let before = store.clone();
        let body = delete
            .invoke(&mut store, &clock(), &json!({ "team_id": "4", "manager_approval": true }))
            .expect("envelope");
        assert!(body.contains("1 active members"));
        assert_eq!(store, before);

        store.insert("members", "1", from_value(json!({ "team_id": "4", "status": "left" })));
        let body = delete
            .invoke(&mut store, &clock(), &json!({ "team_id": "4", "manager_approval": true }))
            .expect("deleted");
        assert_eq!(body, r#"{"success":true,"team_id":"4"}"#);
        assert!(store.get("teams", "4").is_none());
        assert!(store.get("team_tags", "1").is_none());

        let body = delete
            .invoke(&mut store, &clock(), &json!({ "team_id": "4", "manager_approval": true }))
            .expect("envelope");
        assert_eq!(body, r#"{"error":"Team 4 not found"}"#);
    }

    #[test]
    fn link_then_unlink_restores_the_store() {
        let add = tool(link(TAGS, "add_tag_to_team", "Tag a team"));
        let remove = tool(unlink(TAGS, "remove_tag_from_team", "Untag a team"));
        let mut store = store();
        let before = store.clone();
        call(&add, &mut store, json!({ "team_id": "4", "tag": "infra" })).expect("link");
        let err = call(&add, &mut store, json!({ "team_id": "4", "tag": "infra" })).expect_err("dup");
        assert_eq!(err.kind, ErrorKind::DuplicateKey);
        call(&remove, &mut store, json!({ "team_id": "4", "tag": "infra" })).expect("unlink");
        assert_eq!(store.get("teams", "4"), before.get("teams", "4"));
        assert!(store.collection("team_tags").is_none_or(|tags| tags.is_empty()));
        let err = call(&remove, &mut store, json!({ "team_id": "4", "tag": "infra" })).expect_err("gone");
        assert_eq!(err.kind, ErrorKind::NotFound);
    }

    #[test]
    fn search_and_summarize() {
        let search = tool(search(
            &TEAM,
            "search_teams",
            "Search teams",
            SearchSpec::equals(&["tier"])
                .contains(&[("name_contains", &["name"])])
                .sort("name", false),
        ));
        let summarize = tool(summarize(
            &TEAM,
            "summarize_teams",
            "Count teams by tier",
            SummarySpec {
                group_by: "tier",
                sums: &[("total_id", "id")],
                filters: &[],
            },
        ));
        let mut store = store();
        store.insert("teams", "7", from_value(json!({ "id": 7, "name": "Apex", "tier": "gold" })));
        store.insert("teams", "8", from_value(json!({ "id": 8, "name": "Base", "tier": "silver" })));

        let found = call(&search, &mut store, json!({ "tier": "gold" })).expect("search");
        let names: Vec<&str> = found
            .as_array()
            .expect("array")
            .iter()
            .filter_map(|record| record["name"].as_str())
            .collect();
        assert_eq!(names, vec!["Apex", "Core"]);
        let found = call(&search, &mut store, json!({ "name_contains": "AS" })).expect("search");
        assert_eq!(found.as_array().map(Vec::len), Some(1));

        let rows = call(&summarize, &mut store, json!({})).expect("summary");
        assert_eq!(
            rows,
            json!([
                { "tier": "gold", "count": 2, "total_id": 11.0 },
                { "tier": "silver", "count": 1, "total_id": 8.0 }
            ])
        );
    }

    #[test]
    fn advance_requires_approval_and_reports_replays() {
        let approve = tool(advance(
            &TEAM,
            "approve_team",
            "Approve a team",
            COMMITMENT,
            "approved",
            &["director_approval"],
        ));
        let mut store = store();
        let body = approve
            .invoke(&mut store, &clock(), &json!({ "team_id": "4", "director_approval": false }))
            .expect("envelope");
        assert_eq!(body, r#"{"error":"Approval required: director_approval must be true"}"#);
        let ok = call(&approve, &mut store, json!({ "team_id": "4", "director_approval": true })).expect("ok");
        assert_eq!(ok["status"], "approved");
        let body = approve
            .invoke(&mut store, &clock(), &json!({ "team_id": "4", "director_approval": true }))
            .expect("envelope");
        assert_eq!(body, r#"{"error":"Commitment is already approved"}"#);
    }
}
