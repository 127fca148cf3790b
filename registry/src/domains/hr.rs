//! HR and payroll: departments, positions, employees and payroll records.

use serde_json::Value;

use crate::catalog::entity::{EntitySpec, Field, Literal, Rule};
use crate::catalog::shapes::{
    self, SearchSpec, SummarySpec, build_record, check_approvals, create_params, fetch, id_param,
    insert_new, touch,
};
use crate::contract::{Effect, FailMode, Operation, ParamSpec, ParamType};
use crate::core::error::ToolError;
use crate::core::filter::{Filters, filter_and_match};
use crate::core::ids::IdScheme;
use crate::core::record::{money, number, set, status, text};
use crate::core::store::scalar_text;
use crate::core::transitions::{EMPLOYEE, PAYROLL};
use crate::core::validate::{require_date, require_date_order, require_text};

const EMPLOYMENT_TYPES: &[&str] = &["full_time", "part_time", "contract", "intern"];

const OFFBOARD_APPROVALS: &[&str] = &["hr_manager_approval", "compliance_officer_approval"];

static DEPARTMENT: EntitySpec = EntitySpec {
    collection: "departments",
    label: "Department",
    ids: IdScheme::Sequential,
    id_field: "id",
    id_param: "department_id",
    fields: &[
        Field::text("name", "Department name").required(),
        Field::reference("manager_id", "Department head", "employees", "Employee"),
        Field::number("budget", "Annual budget").rule(Rule::NonNegative),
        Field::one_of("status", "Department status", &["active", "inactive"])
            .default(Literal::Str("active")),
    ],
    unique: &["name"],
    timestamps: true,
    dependents: &[],
    owned: &[],
};

static POSITION: EntitySpec = EntitySpec {
    collection: "positions",
    label: "Position",
    ids: IdScheme::Sequential,
    id_field: "id",
    id_param: "position_id",
    fields: &[
        Field::text("title", "Job title").required(),
        Field::reference("department_id", "Owning department", "departments", "Department")
            .required(),
        Field::one_of(
            "level",
            "Seniority level",
            &["entry", "junior", "mid", "senior", "lead", "executive"],
        )
        .required(),
        Field::one_of("employment_type", "Employment type", EMPLOYMENT_TYPES)
            .default(Literal::Str("full_time")),
        Field::number("min_salary", "Salary band floor").rule(Rule::NonNegative),
        Field::number("max_salary", "Salary band ceiling").rule(Rule::NonNegative),
        Field::one_of("status", "Position status", &["open", "filled", "closed"])
            .default(Literal::Str("open")),
    ],
    unique: &[],
    timestamps: true,
    dependents: &[],
    owned: &[],
};

static EMPLOYEE_SPEC: EntitySpec = EntitySpec {
    collection: "employees",
    label: "Employee",
    ids: IdScheme::Sequential,
    id_field: "id",
    id_param: "employee_id",
    fields: &[
        Field::text("first_name", "Given name").required(),
        Field::text("last_name", "Family name").required(),
        Field::text("email", "Work email").required(),
        Field::text("phone", "Phone number"),
        Field::reference("department_id", "Department", "departments", "Department").required(),
        Field::reference("position_id", "Position held", "positions", "Position"),
        Field::reference("manager_id", "Direct manager", "employees", "Employee"),
        Field::date("hire_date", "Hire date (YYYY-MM-DD)").required().create_only(),
        Field::number("salary", "Annual salary").rule(Rule::NonNegative),
        Field::one_of("employment_type", "Employment type", EMPLOYMENT_TYPES)
            .default(Literal::Str("full_time")),
        Field::one_of("status", "Employment status", &["active", "on_leave", "terminated"])
            .system(Literal::Str("active")),
        Field::date("termination_date", "Last working day").system(Literal::Null),
        Field::text("termination_reason", "Reason for leaving").system(Literal::Null),
    ],
    unique: &["email"],
    timestamps: true,
    dependents: &[],
    owned: &[],
};

static PAYROLL_RECORD: EntitySpec = EntitySpec {
    collection: "payroll_records",
    label: "Payroll record",
    ids: IdScheme::Sequential,
    id_field: "id",
    id_param: "payroll_id",
    fields: &[
        Field::reference("employee_id", "Employee paid", "employees", "Employee").required(),
        Field::date("pay_period_start", "Period start (YYYY-MM-DD)").required(),
        Field::date("pay_period_end", "Period end (YYYY-MM-DD)").required(),
        Field::number("gross_pay", "Gross pay").rule(Rule::NonNegative).required(),
        Field::number("deductions", "Total deductions")
            .rule(Rule::NonNegative)
            .default(Literal::Num(0.0)),
        Field::number("net_pay", "Gross pay minus deductions").system(Literal::Null),
        Field::one_of("status", "Payroll status", &["draft", "approved", "paid"])
            .system(Literal::Str("draft")),
    ],
    unique: &[],
    timestamps: true,
    dependents: &[],
    owned: &[],
};

pub fn operations() -> Vec<Operation> {
    vec![
        shapes::create(&DEPARTMENT, "create_department", "Create a department. Names are unique."),
        shapes::search(
            &DEPARTMENT,
            "search_departments",
            "Search departments by status, manager or name.",
            SearchSpec::equals(&["status", "manager_id"]).contains(&[("name_contains", &["name"])]),
        ),
        shapes::update(&DEPARTMENT, "update_department", "Update a department's name, head, budget or status."),
        create_position(),
        shapes::search(
            &POSITION,
            "search_positions",
            "Search positions by department, level, employment type or status.",
            SearchSpec::equals(&["department_id", "level", "employment_type", "status"])
                .contains(&[("title_contains", &["title"])]),
        ),
        shapes::update(&POSITION, "update_position", "Update a position's title, level, salary band or status."),
        create_employee(),
        shapes::get(&EMPLOYEE_SPEC, "get_employee", "Get an employee by id."),
        shapes::update(&EMPLOYEE_SPEC, "update_employee", "Update employee details."),
        shapes::search(
            &EMPLOYEE_SPEC,
            "search_employees",
            "Search employees by department, position, manager, employment type, status or name.",
            SearchSpec::equals(&[
                "department_id",
                "position_id",
                "manager_id",
                "employment_type",
                "status",
            ])
            .contains(&[("name_contains", &["first_name", "last_name"])]),
        ),
        shapes::update_field(
            &EMPLOYEE_SPEC,
            "manage_employee",
            "Change one employee field chosen from an allow-list.",
            &[
                "department_id",
                "position_id",
                "manager_id",
                "salary",
                "phone",
                "email",
                "employment_type",
            ],
        ),
        offboard_employee(),
        create_payroll_record(),
        shapes::advance(
            &PAYROLL_RECORD,
            "approve_payroll_record",
            "Approve a draft payroll record. Requires HR director approval.",
            PAYROLL,
            "approved",
            &["hr_director_approval"],
        ),
        shapes::summarize(
            &PAYROLL_RECORD,
            "summarize_payroll",
            "Count payroll records and total gross and net pay by status.",
            SummarySpec {
                group_by: "status",
                sums: &[("gross_total", "gross_pay"), ("net_total", "net_pay")],
                filters: &["employee_id"],
            },
        ),
    ]
}

fn create_position() -> Operation {
    Operation::new(
        "create_position",
        "Create an open position in a department. The salary band floor may not exceed its ceiling.",
        Effect::Write,
        |ctx, args| {
            let record = build_record(ctx.store, ctx.clock, &POSITION, args)?;
            let band = (args.opt_f64("min_salary")?, args.opt_f64("max_salary")?);
            if matches!(band, (Some(min), Some(max)) if min > max) {
                return Err(ToolError::invalid_argument(
                    "min_salary must not exceed max_salary",
                ));
            }
            let (_, record) = insert_new(ctx, &POSITION, record)?;
            Ok(Value::Object(record))
        },
    )
    .params(create_params(&POSITION))
}

fn create_employee() -> Operation {
    Operation::new(
        "create_employee",
        "Hire an employee. The position, when given, must belong to the department and be open; it becomes filled.",
        Effect::Write,
        |ctx, args| {
            let record = build_record(ctx.store, ctx.clock, &EMPLOYEE_SPEC, args)?;
            let department_id = args.id("department_id")?;
            if let Some(position_id) = args.opt_id("position_id")? {
                let position = fetch(ctx.store, &POSITION, &position_id)?;
                let owner = position.get("department_id").map(scalar_text).unwrap_or_default();
                if owner != department_id {
                    return Err(ToolError::precondition(format!(
                        "Position {position_id} does not belong to department {department_id}"
                    )));
                }
                if status(&position) != "open" {
                    return Err(ToolError::precondition(format!(
                        "Position {position_id} is not open (status is '{}')",
                        status(&position)
                    )));
                }
                let clock = ctx.clock;
                if let Some(position) = ctx.store.get_mut(POSITION.collection, &position_id) {
                    set(position, "status", "filled");
                    touch(position, clock);
                }
            }
            let (_, record) = insert_new(ctx, &EMPLOYEE_SPEC, record)?;
            Ok(Value::Object(record))
        },
    )
    .params(create_params(&EMPLOYEE_SPEC))
}

fn offboard_employee() -> Operation {
    Operation::new(
        "offboard_employee",
        "Terminate an employee. Requires HR manager and compliance officer approval; the employee must have no active direct reports. The employee's position reopens.",
        Effect::Write,
        |ctx, args| {
            check_approvals(args, OFFBOARD_APPROVALS)?;
            let id = args.id("employee_id")?;
            let termination_date = args.str("termination_date")?;
            let reason = args.str("termination_reason")?;
            require_date("termination_date", termination_date)?;
            require_text("termination_reason", reason)?;
            let employee = fetch(ctx.store, &EMPLOYEE_SPEC, &id)?;
            EMPLOYEE.check(status(&employee), "terminated")?;
            if text(&employee, "hire_date").is_some_and(|hired| termination_date < hired) {
                return Err(ToolError::invalid_argument(
                    "termination_date must not be before hire_date",
                ));
            }

            let wanted = Value::String(id.clone());
            let filters = Filters::default().equal("manager_id", &wanted);
            let reports = filter_and_match(ctx.store.collection(EMPLOYEE_SPEC.collection), &filters)
                .into_iter()
                .filter(|report| status(report) != "terminated")
                .count();
            if reports > 0 {
                return Err(ToolError::precondition(format!(
                    "Employee {id} still has {reports} active direct reports"
                )));
            }

            let clock = ctx.clock;
            let position_id = employee
                .get("position_id")
                .filter(|value| !value.is_null())
                .map(scalar_text);
            if let Some(position) =
                position_id.and_then(|key| ctx.store.get_mut(POSITION.collection, &key))
            {
                if status(position) == "filled" {
                    set(position, "status", "open");
                    touch(position, clock);
                }
            }
            let employee = ctx
                .store
                .get_mut(EMPLOYEE_SPEC.collection, &id)
                .ok_or_else(|| EMPLOYEE_SPEC.not_found(&id))?;
            set(employee, "status", "terminated");
            set(employee, "termination_date", termination_date);
            set(employee, "termination_reason", reason);
            touch(employee, clock);
            Ok(Value::Object(employee.clone()))
        },
    )
    .param(id_param(&EMPLOYEE_SPEC))
    .params(OFFBOARD_APPROVALS.iter().map(|flag| shapes::approval_param(flag)))
    .param(ParamSpec::required(
        "termination_date",
        ParamType::String,
        "Last working day (YYYY-MM-DD)",
    ))
    .param(ParamSpec::required(
        "termination_reason",
        ParamType::String,
        "Reason for leaving",
    ))
    .fail_mode(FailMode::Halt)
}

fn create_payroll_record() -> Operation {
    Operation::new(
        "create_payroll_record",
        "Create a draft payroll record for a non-terminated employee. The period end must follow its start and net pay may not be negative.",
        Effect::Write,
        |ctx, args| {
            let mut record = build_record(ctx.store, ctx.clock, &PAYROLL_RECORD, args)?;
            require_date_order(
                "pay_period_start",
                args.str("pay_period_start")?,
                "pay_period_end",
                args.str("pay_period_end")?,
            )?;
            let employee_id = args.id("employee_id")?;
            let employee = fetch(ctx.store, &EMPLOYEE_SPEC, &employee_id)?;
            if status(&employee) == "terminated" {
                return Err(ToolError::precondition(format!(
                    "Employee {employee_id} is terminated"
                )));
            }
            let gross = number(&record, "gross_pay").unwrap_or(0.0);
            let deductions = number(&record, "deductions").unwrap_or(0.0);
            let net = money(gross - deductions);
            if net < 0.0 {
                return Err(ToolError::invalid_argument("net pay must not be negative"));
            }
            set(&mut record, "net_pay", net);
            let (_, record) = insert_new(ctx, &PAYROLL_RECORD, record)?;
            Ok(Value::Object(record))
        },
    )
    .params(create_params(&PAYROLL_RECORD))
}
