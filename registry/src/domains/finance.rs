//! Retail banking: users, accounts, transactions, loans and virtual cards.

use serde_json::{Value, json};

use crate::catalog::entity::{Active, Dependent, EntitySpec, Field, Literal, Rule};
use crate::catalog::shapes::{
    self, ParentRef, SearchSpec, SummarySpec, build_record, create_params, fetch, id_param,
    insert_new, touch,
};
use crate::contract::{Effect, Operation, ParamSpec, ParamType, ToolContext};
use crate::core::error::{ToolError, ToolResult};
use crate::core::ids::IdScheme;
use crate::core::record::{money, number, set, status};
use crate::core::store::Record;
use crate::core::transitions::{ACCOUNT, LOAN, VIRTUAL_CARD};
use crate::core::validate::{require_non_negative, require_positive};

const TRANSACTION_TYPES: &[&str] = &[
    "deposit",
    "withdrawal",
    "payment",
    "transfer_in",
    "transfer_out",
    "fee",
];

/// Transaction types that reduce the balance.
const DEBITS: &[&str] = &["withdrawal", "payment", "transfer_out", "fee"];

static USER: EntitySpec = EntitySpec {
    collection: "users",
    label: "User",
    ids: IdScheme::Prefixed {
        prefix: "U",
        width: 0,
    },
    id_field: "user_id",
    id_param: "user_id",
    fields: &[
        Field::text("first_name", "Given name").required(),
        Field::text("last_name", "Family name").required(),
        Field::text("email", "Email address").required(),
        Field::text("phone", "Phone number"),
        Field::date("date_of_birth", "Date of birth (YYYY-MM-DD)"),
    ],
    unique: &["email"],
    timestamps: true,
    dependents: &[
        Dependent {
            collection: "accounts",
            field: "user_id",
            label: "accounts",
            active: Active::StatusIn(&["open", "frozen"]),
        },
        Dependent {
            collection: "loans",
            field: "user_id",
            label: "loans",
            active: Active::StatusNotIn(&["paid_off"]),
        },
    ],
    owned: &[],
};

static ACCOUNT_SPEC: EntitySpec = EntitySpec {
    collection: "accounts",
    label: "Account",
    ids: IdScheme::Prefixed {
        prefix: "ACC",
        width: 0,
    },
    id_field: "account_id",
    id_param: "account_id",
    fields: &[
        Field::reference("user_id", "Account owner", "users", "User").required(),
        Field::one_of(
            "account_type",
            "Account type",
            &["checking", "savings", "credit", "investment"],
        )
        .required(),
        Field::text("currency", "ISO currency code").default(Literal::Str("USD")),
        Field::one_of("status", "Account status", &["open", "frozen", "closed"])
            .system(Literal::Str("open")),
        Field::date("opened_on", "Opening date").system(Literal::Today),
        Field::text("closed_at", "Closing timestamp").system(Literal::Null),
    ],
    unique: &[],
    timestamps: true,
    dependents: &[],
    owned: &[],
};

static TRANSACTION: EntitySpec = EntitySpec {
    collection: "transactions",
    label: "Transaction",
    ids: IdScheme::Dated { prefix: "TXN-" },
    id_field: "transaction_id",
    id_param: "transaction_id",
    fields: &[
        Field::reference("account_id", "Account", "accounts", "Account").required(),
        Field::one_of("transaction_type", "Transaction type", TRANSACTION_TYPES).required(),
        Field::number("amount", "Amount").rule(Rule::Positive).required(),
        Field::text("description", "Free-text description"),
        Field::text("merchant", "Counterparty or merchant"),
        Field::date("date", "Posting date").system(Literal::Today),
        Field::text("status", "Posting status").system(Literal::Str("posted")),
        Field::number("balance_after", "Available balance after posting").system(Literal::Null),
    ],
    unique: &[],
    timestamps: false,
    dependents: &[],
    owned: &[],
};

static LOAN_SPEC: EntitySpec = EntitySpec {
    collection: "loans",
    label: "Loan",
    ids: IdScheme::Prefixed {
        prefix: "LN-",
        width: 0,
    },
    id_field: "loan_id",
    id_param: "loan_id",
    fields: &[
        Field::reference("user_id", "Borrower", "users", "User").required(),
        Field::reference("account_id", "Disbursement account", "accounts", "Account"),
        Field::one_of("loan_type", "Loan type", &["personal", "auto", "mortgage", "student"])
            .required(),
        Field::number("principal", "Amount borrowed").rule(Rule::Positive).required(),
        Field::number("interest_rate", "Annual rate in percent")
            .rule(Rule::NonNegative)
            .required(),
        Field::integer("term_months", "Term in months").rule(Rule::Positive).required(),
        Field::one_of("status", "Loan status", &["active", "suspended", "defaulted", "paid_off"])
            .system(Literal::Str("active")),
        Field::number("outstanding_balance", "Remaining balance").system(Literal::Null),
        Field::number("monthly_payment", "Scheduled payment").system(Literal::Null),
        Field::date("next_payment_due", "Next due date").system(Literal::Null),
    ],
    unique: &[],
    timestamps: true,
    dependents: &[],
    owned: &[],
};

static VIRTUAL_CARD_SPEC: EntitySpec = EntitySpec {
    collection: "virtual_cards",
    label: "Virtual card",
    ids: IdScheme::Prefixed {
        prefix: "VC",
        width: 0,
    },
    id_field: "card_id",
    id_param: "card_id",
    fields: &[
        Field::reference("account_id", "Funding account", "accounts", "Account").required(),
        Field::text("cardholder_name", "Name printed on the card").required(),
        Field::number("spending_limit", "Monthly limit").rule(Rule::Positive),
        Field::one_of("status", "Card status", &["active", "frozen", "cancelled"])
            .system(Literal::Str("active")),
        Field::text("card_number", "Card number").system(Literal::Null),
        Field::date("expires_on", "Expiry date").system(Literal::Null),
    ],
    unique: &[],
    timestamps: true,
    dependents: &[],
    owned: &[],
};

pub fn operations() -> Vec<Operation> {
    vec![
        shapes::create(&USER, "create_user", "Create a bank user. The email must be unique."),
        shapes::get(&USER, "get_user", "Get a user by id."),
        shapes::delete(
            &USER,
            "delete_user",
            "Delete a user with no open or frozen accounts and no outstanding loans.",
            &[],
        ),
        create_account(),
        shapes::get(&ACCOUNT_SPEC, "get_account", "Get an account with its balances."),
        shapes::search(
            &ACCOUNT_SPEC,
            "search_accounts",
            "Search accounts by owner, type or status.",
            SearchSpec::equals(&["user_id", "account_type", "status"]),
        ),
        update_account_status(),
        record_transaction(),
        shapes::list_children(
            &TRANSACTION,
            "list_transactions",
            "List an account's transactions, newest first.",
            ParentRef {
                param: "account_id",
                description: "Account identifier",
                collection: "accounts",
                label: "Account",
                field: "account_id",
            },
            Some(("date", true)),
        ),
        create_loan(),
        shapes::get(&LOAN_SPEC, "get_loan", "Get a loan by id."),
        update_loan_status(),
        record_loan_payment(),
        create_virtual_card(),
        shapes::update_status(
            &VIRTUAL_CARD_SPEC,
            "update_virtual_card_status",
            "Freeze, unfreeze or cancel a virtual card.",
            VIRTUAL_CARD,
            "new_status",
        ),
        shapes::summarize(
            &ACCOUNT_SPEC,
            "summarize_accounts",
            "Count accounts and total their balances by account type.",
            SummarySpec {
                group_by: "account_type",
                sums: &[
                    ("available_total", "balances.available"),
                    ("book_total", "balances.book"),
                ],
                filters: &["user_id", "status"],
            },
        ),
    ]
}

fn create_account() -> Operation {
    Operation::new(
        "create_account",
        "Open an account for a user. Balances start at the optional initial deposit.",
        Effect::Write,
        |ctx, args| {
            let mut record = build_record(ctx.store, ctx.clock, &ACCOUNT_SPEC, args)?;
            let deposit = args.opt_f64("initial_deposit")?.unwrap_or(0.0);
            require_non_negative("initial_deposit", deposit)?;
            let deposit = money(deposit);
            set(
                &mut record,
                "balances",
                json!({ "available": deposit, "book": deposit, "closing": null }),
            );
            let (_, record) = insert_new(ctx, &ACCOUNT_SPEC, record)?;
            Ok(Value::Object(record))
        },
    )
    .params(create_params(&ACCOUNT_SPEC))
    .param(ParamSpec::optional(
        "initial_deposit",
        ParamType::Number,
        "Opening balance (defaults to 0)",
    ))
}

fn update_account_status() -> Operation {
    Operation::new(
        "update_account_status",
        "Freeze, reopen or close an account. Freezing zeroes the available balance; reopening restores it from the book balance; closing zeroes both and records the prior available balance as the closing balance.",
        Effect::Write,
        |ctx, args| {
            let id = args.id("account_id")?;
            let target = args.str("new_status")?;
            let account = fetch(ctx.store, &ACCOUNT_SPEC, &id)?;
            let from = status(&account).to_string();
            ACCOUNT.check(&from, target)?;
            let available = number(&account, "balances.available").unwrap_or(0.0);
            let book = number(&account, "balances.book").unwrap_or(0.0);
            let clock = ctx.clock;
            let account = account_mut(ctx, &id)?;
            match target {
                "frozen" => set_balance(account, "available", json!(0.0)),
                "open" => set_balance(account, "available", json!(book)),
                "closed" => {
                    set_balance(account, "closing", json!(available));
                    set_balance(account, "available", json!(0.0));
                    set_balance(account, "book", json!(0.0));
                    set(account, "closed_at", clock.now());
                }
                _ => {}
            }
            set(account, "status", target);
            touch(account, clock);
            Ok(Value::Object(account.clone()))
        },
    )
    .param(id_param(&ACCOUNT_SPEC))
    .param(
        ParamSpec::required("new_status", ParamType::String, "Target status")
            .one_of(&ACCOUNT.states()),
    )
}

fn record_transaction() -> Operation {
    Operation::new(
        "record_transaction",
        "Post a transaction to an open account. Debits (withdrawal, payment, transfer_out, fee) require sufficient available balance.",
        Effect::Write,
        |ctx, args| {
            let record = build_record(ctx.store, ctx.clock, &TRANSACTION, args)?;
            let account_id = args.id("account_id")?;
            let kind = args.str("transaction_type")?;
            let amount = args.f64("amount")?;
            let transaction = post(ctx, record, &account_id, kind, amount)?;
            Ok(Value::Object(transaction))
        },
    )
    .params(create_params(&TRANSACTION))
}

fn create_loan() -> Operation {
    Operation::new(
        "create_loan",
        "Originate an active loan. The outstanding balance starts at the principal; the first payment is due in 30 days.",
        Effect::Write,
        |ctx, args| {
            let mut record = build_record(ctx.store, ctx.clock, &LOAN_SPEC, args)?;
            let principal = args.f64("principal")?;
            let rate = args.f64("interest_rate")?;
            let term = args.i64("term_months")?;
            if let Some(account_id) = args.opt_id("account_id")? {
                let account = fetch(ctx.store, &ACCOUNT_SPEC, &account_id)?;
                let owner = account.get("user_id").and_then(Value::as_str).unwrap_or("");
                if owner != args.id("user_id")? {
                    return Err(ToolError::precondition(format!(
                        "Account {account_id} does not belong to the borrower"
                    )));
                }
            }
            let total = principal * (1.0 + rate / 100.0 * term as f64 / 12.0);
            set(&mut record, "outstanding_balance", money(principal));
            set(&mut record, "monthly_payment", money(total / term as f64));
            set(&mut record, "next_payment_due", ctx.clock.date_after_days(30));
            let (_, record) = insert_new(ctx, &LOAN_SPEC, record)?;
            Ok(Value::Object(record))
        },
    )
    .params(create_params(&LOAN_SPEC))
}

fn update_loan_status() -> Operation {
    Operation::new(
        "update_loan_status",
        "Change a loan's status. Marking it paid_off clears the balance and the next due date.",
        Effect::Write,
        |ctx, args| {
            let id = args.id("loan_id")?;
            let target = args.str("new_status")?;
            let loan = shapes::transition(ctx, &LOAN_SPEC, LOAN, &id, target)?;
            if target != "paid_off" {
                return Ok(Value::Object(loan));
            }
            let loan = loan_mut(ctx, &id)?;
            set(loan, "outstanding_balance", 0.0);
            set(loan, "next_payment_due", Value::Null);
            Ok(Value::Object(loan.clone()))
        },
    )
    .param(id_param(&LOAN_SPEC))
    .param(
        ParamSpec::required("new_status", ParamType::String, "Target status")
            .one_of(&LOAN.states()),
    )
}

fn record_loan_payment() -> Operation {
    Operation::new(
        "record_loan_payment",
        "Apply a payment to an active loan, optionally debiting an open account. A payment that clears the balance marks the loan paid_off.",
        Effect::Write,
        |ctx, args| {
            let id = args.id("loan_id")?;
            let amount = args.f64("amount")?;
            require_positive("amount", amount)?;
            let loan = fetch(ctx.store, &LOAN_SPEC, &id)?;
            if status(&loan) != "active" {
                return Err(ToolError::precondition(format!(
                    "Loan {id} is not active (status is '{}')",
                    status(&loan)
                )));
            }
            let outstanding = number(&loan, "outstanding_balance").unwrap_or(0.0);
            if amount > outstanding + 0.005 {
                return Err(ToolError::invalid_argument(format!(
                    "Payment {amount} exceeds outstanding balance {outstanding}"
                )));
            }
            if let Some(account_id) = args.opt_id("account_id")? {
                let mut debit = serde_json::Map::new();
                set(&mut debit, "account_id", account_id.as_str());
                set(&mut debit, "transaction_type", "payment");
                set(&mut debit, "amount", amount);
                set(&mut debit, "description", format!("Loan payment {id}"));
                set(&mut debit, "merchant", Value::Null);
                set(&mut debit, "date", ctx.clock.today());
                set(&mut debit, "status", "posted");
                set(&mut debit, "balance_after", Value::Null);
                post(ctx, debit, &account_id, "payment", amount)?;
            }
            let remaining = money(outstanding - amount);
            let clock = ctx.clock;
            let loan = loan_mut(ctx, &id)?;
            set(loan, "outstanding_balance", remaining);
            if remaining <= 0.0 {
                LOAN.check("active", "paid_off")?;
                set(loan, "outstanding_balance", 0.0);
                set(loan, "status", "paid_off");
                set(loan, "next_payment_due", Value::Null);
            } else {
                set(loan, "next_payment_due", clock.date_after_days(30));
            }
            set(loan, "last_payment_date", clock.today());
            touch(loan, clock);
            Ok(Value::Object(loan.clone()))
        },
    )
    .param(id_param(&LOAN_SPEC))
    .param(ParamSpec::required("amount", ParamType::Number, "Payment amount"))
    .param(ParamSpec::optional(
        "account_id",
        ParamType::String,
        "Account to debit",
    ))
}

fn create_virtual_card() -> Operation {
    Operation::new(
        "create_virtual_card",
        "Issue a virtual card on an open account. The card number is derived from the card id; cards expire after three years.",
        Effect::Write,
        |ctx, args| {
            let record = build_record(ctx.store, ctx.clock, &VIRTUAL_CARD_SPEC, args)?;
            let account_id = args.id("account_id")?;
            let account = fetch(ctx.store, &ACCOUNT_SPEC, &account_id)?;
            if status(&account) != "open" {
                return Err(ToolError::precondition(format!(
                    "Account {account_id} is not open (status is '{}')",
                    status(&account)
                )));
            }
            let (key, _) = insert_new(ctx, &VIRTUAL_CARD_SPEC, record)?;
            let digits: String = key.chars().filter(char::is_ascii_digit).collect();
            let card_number = format!("4000{digits:0>12}");
            let expires = ctx.clock.date_after_days(3 * 365);
            let card = ctx
                .store
                .get_mut(VIRTUAL_CARD_SPEC.collection, &key)
                .ok_or_else(|| VIRTUAL_CARD_SPEC.not_found(&key))?;
            set(card, "card_number", card_number);
            set(card, "expires_on", expires);
            Ok(Value::Object(card.clone()))
        },
    )
    .params(create_params(&VIRTUAL_CARD_SPEC))
}

/// Apply a transaction to its account and store it. Returns the stored row.
fn post(
    ctx: &mut ToolContext<'_>,
    mut transaction: Record,
    account_id: &str,
    kind: &str,
    amount: f64,
) -> ToolResult<Record> {
    let account = fetch(ctx.store, &ACCOUNT_SPEC, account_id)?;
    if status(&account) != "open" {
        return Err(ToolError::precondition(format!(
            "Account {account_id} is not open (status is '{}')",
            status(&account)
        )));
    }
    let available = number(&account, "balances.available").unwrap_or(0.0);
    let book = number(&account, "balances.book").unwrap_or(0.0);
    let delta = if DEBITS.contains(&kind) {
        if amount > available + 0.005 {
            return Err(ToolError::precondition(format!(
                "Insufficient funds in account {account_id}: available {available}, requested {amount}"
            )));
        }
        -amount
    } else {
        amount
    };
    let clock = ctx.clock;
    let account = account_mut(ctx, account_id)?;
    set_balance(account, "available", json!(money(available + delta)));
    set_balance(account, "book", json!(money(book + delta)));
    touch(account, clock);
    set(&mut transaction, "balance_after", money(available + delta));
    let (_, transaction) = insert_new(ctx, &TRANSACTION, transaction)?;
    Ok(transaction)
}

fn account_mut<'s>(ctx: &'s mut ToolContext<'_>, id: &str) -> ToolResult<&'s mut Record> {
    ctx.store
        .get_mut(ACCOUNT_SPEC.collection, id)
        .ok_or_else(|| ACCOUNT_SPEC.not_found(id))
}

fn loan_mut<'s>(ctx: &'s mut ToolContext<'_>, id: &str) -> ToolResult<&'s mut Record> {
    ctx.store
        .get_mut(LOAN_SPEC.collection, id)
        .ok_or_else(|| LOAN_SPEC.not_found(id))
}

fn set_balance(account: &mut Record, key: &str, value: Value) {
    let balances = account
        .entry("balances")
        .or_insert_with(|| json!({}));
    if !balances.is_object() {
        *balances = json!({});
    }
    if let Some(balances) = balances.as_object_mut() {
        balances.insert(key.to_string(), value);
    }
}
