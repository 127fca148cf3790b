//! Fund administration: investors, funds, capital commitments, subscriptions,
//! trades, holdings and NAV history.

use serde_json::{Value, json};

use crate::catalog::entity::{Active, Dependent, EntitySpec, Field, Literal, Owned, Rule};
use crate::catalog::shapes::{
    self, ParentRef, SearchSpec, SummarySpec, build_record, check_approvals, create_params, fetch,
    id_param, insert_new, touch,
};
use crate::contract::{Effect, FailMode, Operation};
use crate::core::error::{ToolError, ToolResult};
use crate::core::filter::{Filters, filter_and_match};
use crate::core::ids::IdScheme;
use crate::core::record::{set, status};
use crate::core::store::{Store, scalar_text};
use crate::core::transitions::{COMMITMENT, SUBSCRIPTION, TRADE};

const FUND_MANAGER: &[&str] = &["fund_manager_approval"];
const COMPLIANCE: &[&str] = &["compliance_officer_approval"];
const DELETE_FUND_APPROVALS: &[&str] = &["fund_manager_approval", "compliance_officer_approval"];

/// Commitment and subscription states that keep an investor or fund engaged.
const ENGAGED: &[&str] = &["approved", "fulfilled"];
const OPEN_REQUESTS: &[&str] = &["pending", "approved"];

static INVESTOR: EntitySpec = EntitySpec {
    collection: "investors",
    label: "Investor",
    ids: IdScheme::Sequential,
    id_field: "id",
    id_param: "investor_id",
    fields: &[
        Field::text("name", "Legal name").required(),
        Field::text("email", "Contact email").required(),
        Field::one_of(
            "investor_type",
            "Investor classification",
            &["individual", "institutional", "family_office", "pension", "endowment"],
        )
        .default(Literal::Str("individual")),
        Field::text("country", "Country of domicile"),
        Field::one_of(
            "accreditation_status",
            "Accreditation review outcome",
            &["accredited", "non_accredited", "pending"],
        )
        .default(Literal::Str("pending")),
        Field::one_of("status", "Investor status", &["active", "offboarded"])
            .system(Literal::Str("active")),
        Field::text("offboarded_at", "Offboarding timestamp").system(Literal::Null),
    ],
    unique: &["email"],
    timestamps: true,
    dependents: &[],
    owned: &[],
};

static FUND: EntitySpec = EntitySpec {
    collection: "funds",
    label: "Fund",
    ids: IdScheme::Sequential,
    id_field: "id",
    id_param: "fund_id",
    fields: &[
        Field::text("name", "Fund name").required(),
        Field::one_of(
            "fund_type",
            "Strategy classification",
            &["equity", "fixed_income", "money_market", "multi_asset", "hedge", "private_equity"],
        )
        .required(),
        Field::text("base_currency", "ISO currency code").default(Literal::Str("USD")),
        Field::text("manager_name", "Portfolio manager"),
        Field::number("size", "Assets under management")
            .rule(Rule::NonNegative)
            .default(Literal::Num(0.0)),
        Field::one_of("status", "Fund status", &["open", "closed"]).default(Literal::Str("open")),
    ],
    unique: &["name"],
    timestamps: true,
    dependents: &[
        Dependent {
            collection: "commitments",
            field: "fund_id",
            label: "commitments",
            active: Active::StatusIn(OPEN_REQUESTS),
        },
        Dependent {
            collection: "subscriptions",
            field: "fund_id",
            label: "subscriptions",
            active: Active::StatusIn(OPEN_REQUESTS),
        },
        Dependent {
            collection: "trades",
            field: "fund_id",
            label: "pending trades",
            active: Active::StatusIn(&["pending"]),
        },
    ],
    owned: &[Owned {
        collection: "nav_records",
        field: "fund_id",
    }],
};

static INSTRUMENT: EntitySpec = EntitySpec {
    collection: "instruments",
    label: "Instrument",
    ids: IdScheme::Sequential,
    id_field: "id",
    id_param: "instrument_id",
    fields: &[
        Field::text("ticker", "Exchange ticker").required(),
        Field::text("name", "Instrument name").required(),
        Field::one_of(
            "instrument_type",
            "Asset class",
            &["equity", "bond", "etf", "cash", "derivative"],
        )
        .required(),
        Field::text("currency", "ISO currency code").default(Literal::Str("USD")),
        Field::one_of("status", "Trading status", &["active", "inactive"])
            .default(Literal::Str("active")),
    ],
    unique: &["ticker"],
    timestamps: true,
    dependents: &[],
    owned: &[],
};

static COMMITMENT_SPEC: EntitySpec = EntitySpec {
    collection: "commitments",
    label: "Commitment",
    ids: IdScheme::Sequential,
    id_field: "id",
    id_param: "commitment_id",
    fields: &[
        Field::reference("fund_id", "Fund committed to", "funds", "Fund")
            .required()
            .create_only(),
        Field::reference("investor_id", "Committing investor", "investors", "Investor")
            .required()
            .create_only(),
        Field::number("amount", "Committed capital")
            .required()
            .rule(Rule::Positive)
            .create_only(),
        Field::date("commitment_date", "Date of commitment")
            .default(Literal::Today)
            .create_only(),
        Field::one_of("status", "Commitment status", &["pending", "approved", "fulfilled", "rejected"])
            .system(Literal::Str("pending")),
    ],
    unique: &[],
    timestamps: true,
    dependents: &[],
    owned: &[],
};

static SUBSCRIPTION_SPEC: EntitySpec = EntitySpec {
    collection: "subscriptions",
    label: "Subscription",
    ids: IdScheme::Sequential,
    id_field: "id",
    id_param: "subscription_id",
    fields: &[
        Field::reference("fund_id", "Fund subscribed to", "funds", "Fund")
            .required()
            .create_only(),
        Field::reference("investor_id", "Subscribing investor", "investors", "Investor")
            .required()
            .create_only(),
        Field::number("amount", "Subscription amount")
            .required()
            .rule(Rule::Positive)
            .create_only(),
        Field::one_of("payment_method", "Funding method", &["wire", "ach", "check"])
            .default(Literal::Str("wire"))
            .create_only(),
        Field::date("request_date", "Date requested")
            .default(Literal::Today)
            .create_only(),
        Field::one_of("status", "Subscription status", &["pending", "approved", "fulfilled", "rejected"])
            .system(Literal::Str("pending")),
    ],
    unique: &[],
    timestamps: true,
    dependents: &[],
    owned: &[],
};

static TRADE_SPEC: EntitySpec = EntitySpec {
    collection: "trades",
    label: "Trade",
    ids: IdScheme::Sequential,
    id_field: "id",
    id_param: "trade_id",
    fields: &[
        Field::reference("fund_id", "Trading fund", "funds", "Fund")
            .required()
            .create_only(),
        Field::reference("instrument_id", "Traded instrument", "instruments", "Instrument")
            .required()
            .create_only(),
        Field::one_of("side", "Direction", &["buy", "sell"])
            .required()
            .create_only(),
        Field::number("quantity", "Units traded")
            .required()
            .rule(Rule::Positive)
            .create_only(),
        Field::number("price", "Price per unit")
            .required()
            .rule(Rule::Positive)
            .create_only(),
        Field::date("trade_date", "Trade date")
            .default(Literal::Today)
            .create_only(),
        Field::one_of("status", "Trade status", &["pending", "executed", "failed"])
            .system(Literal::Str("pending")),
    ],
    unique: &[],
    timestamps: true,
    dependents: &[],
    owned: &[],
};

static HOLDING: EntitySpec = EntitySpec {
    collection: "portfolio_holdings",
    label: "Holding",
    ids: IdScheme::Sequential,
    id_field: "id",
    id_param: "holding_id",
    fields: &[
        Field::reference("investor_id", "Holding investor", "investors", "Investor").required(),
        Field::reference("instrument_id", "Held instrument", "instruments", "Instrument").required(),
        Field::reference("fund_id", "Fund the position is held through", "funds", "Fund"),
        Field::number("quantity", "Units held").required().rule(Rule::Positive),
        Field::number("cost_basis", "Total acquisition cost")
            .rule(Rule::NonNegative)
            .default(Literal::Num(0.0)),
    ],
    unique: &[],
    timestamps: true,
    dependents: &[],
    owned: &[],
};

static NAV_RECORD: EntitySpec = EntitySpec {
    collection: "nav_records",
    label: "NAV record",
    ids: IdScheme::Sequential,
    id_field: "id",
    id_param: "nav_id",
    fields: &[
        Field::reference("fund_id", "Fund valued", "funds", "Fund").required(),
        Field::date("nav_date", "Valuation date").required(),
        Field::number("nav_value", "Net asset value per unit")
            .required()
            .rule(Rule::Positive),
    ],
    unique: &[],
    timestamps: true,
    dependents: &[],
    owned: &[],
};

const OF_FUND: ParentRef = ParentRef {
    param: "fund_id",
    description: "Fund identifier",
    collection: "funds",
    label: "Fund",
    field: "fund_id",
};

pub fn operations() -> Vec<Operation> {
    vec![
        shapes::create(&INVESTOR, "create_investor", "Onboard an investor. Emails are unique."),
        shapes::get(&INVESTOR, "get_investor", "Get an investor by id."),
        shapes::update(&INVESTOR, "update_investor", "Update an investor's profile."),
        shapes::search(
            &INVESTOR,
            "search_investors",
            "Search investors by type, status, accreditation, country or name.",
            SearchSpec::equals(&["investor_type", "status", "accreditation_status", "country", "email"])
                .contains(&[("name_contains", &["name"])]),
        ),
        offboard_investor(),
        shapes::create(&FUND, "create_fund", "Create a fund. Fund names are unique."),
        shapes::update(&FUND, "update_fund", "Update a fund's details or status."),
        shapes::search(
            &FUND,
            "search_funds",
            "Search funds by type, status or name.",
            SearchSpec::equals(&["fund_type", "status", "base_currency"])
                .contains(&[("name_contains", &["name"])]),
        ),
        shapes::delete(
            &FUND,
            "delete_fund",
            "Delete a fund with no open commitments, open subscriptions or pending trades. Requires fund manager and compliance officer approval.",
            DELETE_FUND_APPROVALS,
        ),
        engagement(&COMMITMENT_SPEC, "create_commitment", "Record an investor's capital commitment to an open fund."),
        shapes::advance(
            &COMMITMENT_SPEC,
            "approve_commitment",
            "Approve a pending commitment. Requires fund manager approval.",
            COMMITMENT,
            "approved",
            FUND_MANAGER,
        ),
        shapes::advance(
            &COMMITMENT_SPEC,
            "fulfill_commitment",
            "Mark a commitment as fulfilled once capital is received. Requires compliance officer approval.",
            COMMITMENT,
            "fulfilled",
            COMPLIANCE,
        ),
        engagement(&SUBSCRIPTION_SPEC, "create_subscription", "Request a subscription into an open fund."),
        shapes::advance(
            &SUBSCRIPTION_SPEC,
            "approve_subscription",
            "Approve a pending subscription. Requires fund manager approval.",
            SUBSCRIPTION,
            "approved",
            FUND_MANAGER,
        ),
        shapes::advance(
            &SUBSCRIPTION_SPEC,
            "reject_subscription",
            "Reject a pending subscription.",
            SUBSCRIPTION,
            "rejected",
            &[],
        ),
        shapes::advance(
            &SUBSCRIPTION_SPEC,
            "fulfill_subscription",
            "Mark a subscription as fulfilled. Requires compliance officer approval.",
            SUBSCRIPTION,
            "fulfilled",
            COMPLIANCE,
        ),
        shapes::create(&INSTRUMENT, "create_instrument", "Register a tradable instrument. Tickers are unique."),
        shapes::search(
            &INSTRUMENT,
            "search_instruments",
            "Search instruments by type, status, ticker or name.",
            SearchSpec::equals(&["instrument_type", "status", "ticker", "currency"])
                .contains(&[("name_contains", &["name"])]),
        ),
        create_trade(),
        shapes::update_status(
            &TRADE_SPEC,
            "update_trade_status",
            "Settle a pending trade as executed or failed.",
            TRADE,
            "status",
        ),
        get_investor_portfolio(),
        shapes::create(&HOLDING, "add_holding", "Add a position to an investor's portfolio."),
        record_nav(),
        shapes::list_children(
            &NAV_RECORD,
            "list_nav_records",
            "List a fund's NAV history, newest first.",
            OF_FUND,
            Some(("nav_date", true)),
        ),
        shapes::summarize(
            &COMMITMENT_SPEC,
            "summarize_commitments",
            "Commitment counts and totals per fund.",
            SummarySpec {
                group_by: "fund_id",
                sums: &[("total_amount", "amount")],
                filters: &["status", "investor_id"],
            },
        ),
    ]
}

fn offboard_investor() -> Operation {
    Operation::new(
        "offboard_investor",
        "Offboard an investor. Requires compliance officer approval; the investor must hold no approved or fulfilled commitments or subscriptions.",
        Effect::Write,
        |ctx, args| {
            check_approvals(args, COMPLIANCE)?;
            let id = args.id("investor_id")?;
            let investor = fetch(ctx.store, &INVESTOR, &id)?;
            if status(&investor) == "offboarded" {
                return Err(ToolError::already_applied(format!(
                    "Investor {id} is already offboarded"
                )));
            }
            let engaged = engaged_count(ctx.store, COMMITMENT_SPEC.collection, &id)
                + engaged_count(ctx.store, SUBSCRIPTION_SPEC.collection, &id);
            if engaged > 0 {
                return Err(ToolError::precondition(format!(
                    "Investor {id} has {engaged} approved or fulfilled commitments or subscriptions"
                )));
            }
            let clock = ctx.clock;
            let investor = ctx
                .store
                .get_mut(INVESTOR.collection, &id)
                .ok_or_else(|| INVESTOR.not_found(&id))?;
            set(investor, "status", "offboarded");
            set(investor, "offboarded_at", clock.now());
            touch(investor, clock);
            Ok(Value::Object(investor.clone()))
        },
    )
    .param(id_param(&INVESTOR))
    .param(shapes::approval_param(COMPLIANCE[0]))
    .fail_mode(FailMode::Halt)
}

fn engaged_count(store: &Store, collection: &str, investor_id: &str) -> usize {
    let wanted = Value::String(investor_id.to_string());
    let filters = Filters::default().equal("investor_id", &wanted);
    filter_and_match(store.collection(collection), &filters)
        .into_iter()
        .filter(|record| ENGAGED.contains(&status(record)))
        .count()
}

/// Create for commitments and subscriptions: active investor, open fund.
fn engagement(spec: &'static EntitySpec, name: &'static str, description: &str) -> Operation {
    Operation::new(name, description, Effect::Write, move |ctx, args| {
        let record = build_record(ctx.store, ctx.clock, spec, args)?;
        check_parties(ctx.store, &args.id("fund_id")?, &args.id("investor_id")?)?;
        let (_, record) = insert_new(ctx, spec, record)?;
        Ok(Value::Object(record))
    })
    .params(create_params(spec))
}

fn check_parties(store: &Store, fund_id: &str, investor_id: &str) -> ToolResult<()> {
    let fund = fetch(store, &FUND, fund_id)?;
    if status(&fund) != "open" {
        return Err(ToolError::precondition(format!(
            "Fund {fund_id} is not open: status is '{}'",
            status(&fund)
        )));
    }
    let investor = fetch(store, &INVESTOR, investor_id)?;
    if status(&investor) != "active" {
        return Err(ToolError::precondition(format!(
            "Investor {investor_id} is not active: status is '{}'",
            status(&investor)
        )));
    }
    Ok(())
}

fn create_trade() -> Operation {
    Operation::new(
        "create_trade",
        "Place a pending trade for an open fund in an active instrument.",
        Effect::Write,
        |ctx, args| {
            let record = build_record(ctx.store, ctx.clock, &TRADE_SPEC, args)?;
            let fund_id = args.id("fund_id")?;
            let fund = fetch(ctx.store, &FUND, &fund_id)?;
            if status(&fund) != "open" {
                return Err(ToolError::precondition(format!(
                    "Fund {fund_id} is not open: status is '{}'",
                    status(&fund)
                )));
            }
            let instrument_id = args.id("instrument_id")?;
            let instrument = fetch(ctx.store, &INSTRUMENT, &instrument_id)?;
            if status(&instrument) != "active" {
                return Err(ToolError::precondition(format!(
                    "Instrument {instrument_id} is not active"
                )));
            }
            let (_, record) = insert_new(ctx, &TRADE_SPEC, record)?;
            Ok(Value::Object(record))
        },
    )
    .params(create_params(&TRADE_SPEC))
}

fn get_investor_portfolio() -> Operation {
    Operation::new(
        "get_investor_portfolio",
        "List an investor's holdings, each joined with its instrument.",
        Effect::Read,
        |ctx, args| {
            let id = args.id("investor_id")?;
            fetch(ctx.store, &INVESTOR, &id)?;
            let wanted = Value::String(id.clone());
            let filters = Filters::default().equal("investor_id", &wanted);
            let holdings: Vec<Value> = filter_and_match(ctx.store.collection(HOLDING.collection), &filters)
                .into_iter()
                .map(|holding| {
                    let mut holding = holding.clone();
                    let instrument = holding
                        .get("instrument_id")
                        .and_then(|key| ctx.store.get(INSTRUMENT.collection, &scalar_text(key)))
                        .cloned()
                        .map_or(Value::Null, Value::Object);
                    holding.insert("instrument".to_string(), instrument);
                    Value::Object(holding)
                })
                .collect();
            Ok(json!({ "investor_id": id, "holdings": holdings }))
        },
    )
    .param(id_param(&INVESTOR))
}

fn record_nav() -> Operation {
    Operation::new(
        "record_nav",
        "Record a fund's net asset value for a date. One record per fund and date.",
        Effect::Write,
        |ctx, args| {
            let record = build_record(ctx.store, ctx.clock, &NAV_RECORD, args)?;
            let fund_id = Value::String(args.id("fund_id")?);
            let nav_date = args.str("nav_date")?;
            let date = Value::String(nav_date.to_string());
            let filters = Filters::default()
                .equal("fund_id", &fund_id)
                .equal("nav_date", &date);
            if !filter_and_match(ctx.store.collection(NAV_RECORD.collection), &filters).is_empty() {
                return Err(ToolError::duplicate(format!(
                    "NAV record for fund {} on {nav_date} already exists",
                    scalar_text(&fund_id)
                )));
            }
            let (_, record) = insert_new(ctx, &NAV_RECORD, record)?;
            Ok(Value::Object(record))
        },
    )
    .params(create_params(&NAV_RECORD))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use crate::catalog::naming::Interface;
    use crate::contract::is_failure_envelope;
    use crate::core::clock::Clock;
    use crate::core::record::from_value;

    fn fixture() -> Store {
        let mut store = Store::new();
        store.insert(
            "investors",
            "1",
            from_value(json!({ "id": 1, "name": "Northwind", "email": "ops@northwind.example", "status": "active" })),
        );
        store.insert(
            "funds",
            "1",
            from_value(json!({ "id": 1, "name": "Growth I", "fund_type": "equity", "status": "open" })),
        );
        store.insert(
            "commitments",
            "1",
            from_value(json!({ "id": 1, "fund_id": "1", "investor_id": "1", "amount": 5000.0, "status": "approved" })),
        );
        store
    }

    #[test]
    fn fund_with_open_commitment_cannot_be_deleted() {
        let catalog = Catalog::build(operations(), Interface::default()).expect("catalog");
        let clock = Clock::fixed("2025-08-07T00:00:00Z").expect("clock");
        let mut store = fixture();

        let body = catalog
            .invoke(
                "delete_fund",
                &mut store,
                &clock,
                &json!({ "fund_id": "1", "fund_manager_approval": true, "compliance_officer_approval": true }),
            )
            .expect("envelope");
        assert!(is_failure_envelope(&body));
        assert!(body.contains("1 active commitments"));
        assert!(store.get("funds", "1").is_some());
    }

    #[test]
    fn offboarding_engaged_investor_halts() {
        let catalog = Catalog::build(operations(), Interface::default()).expect("catalog");
        let clock = Clock::fixed("2025-08-07T00:00:00Z").expect("clock");
        let mut store = fixture();

        let body = catalog
            .invoke(
                "offboard_investor",
                &mut store,
                &clock,
                &json!({ "investor_id": "1", "compliance_officer_approval": true }),
            )
            .expect("envelope");
        let body: Value = serde_json::from_str(&body).expect("json");
        assert_eq!(body["halt"], true);
        assert_eq!(store.get("investors", "1").expect("investor")["status"], "active");
    }

    #[test]
    fn nav_is_unique_per_fund_and_date() {
        let catalog = Catalog::build(operations(), Interface::default()).expect("catalog");
        let clock = Clock::fixed("2025-08-07T00:00:00Z").expect("clock");
        let mut store = fixture();
        let nav = json!({ "fund_id": "1", "nav_date": "2025-08-06", "nav_value": 10.25 });

        catalog.invoke("record_nav", &mut store, &clock, &nav).expect("first");
        let err = catalog
            .invoke("record_nav", &mut store, &clock, &nav)
            .expect_err("duplicate");
        assert_eq!(err.kind, crate::core::error::ErrorKind::DuplicateKey);
    }
}
