//! E-commerce: customers, catalog, sales orders, fulfillment, procurement.

use std::collections::BTreeMap;

use serde_json::{Value, json};

use crate::catalog::entity::{Active, Dependent, EntitySpec, Field, Literal, Rule};
use crate::catalog::shapes::{
    self, SearchSpec, SummarySpec, build_record, create_params, fetch, id_param, insert_new, touch,
};
use crate::contract::{Effect, Operation, ParamSpec, ParamType, ToolContext};
use crate::core::error::{ToolError, ToolResult};
use crate::core::filter::{Filters, filter_and_match};
use crate::core::ids::IdScheme;
use crate::core::record::{money, number, set, status};
use crate::core::store::{Record, scalar_text};
use crate::core::transitions::{PURCHASE_ORDER, SALES_ORDER, SHIPMENT};
use crate::core::validate::require_exists;

const ACTIVE_STATES: &[&str] = &["active", "inactive"];

static CUSTOMER: EntitySpec = EntitySpec {
    collection: "customers",
    label: "Customer",
    ids: IdScheme::Sequential,
    id_field: "id",
    id_param: "customer_id",
    fields: &[
        Field::text("name", "Full name").required(),
        Field::text("email", "Email address").required(),
        Field::text("phone", "Phone number"),
        Field::text("address", "Postal address"),
        Field::one_of("status", "Customer status", ACTIVE_STATES).default(Literal::Str("active")),
    ],
    unique: &["email"],
    timestamps: true,
    dependents: &[],
    owned: &[],
};

static SUPPLIER: EntitySpec = EntitySpec {
    collection: "suppliers",
    label: "Supplier",
    ids: IdScheme::Prefixed {
        prefix: "SUP",
        width: 3,
    },
    id_field: "supplier_id",
    id_param: "supplier_id",
    fields: &[
        Field::text("name", "Supplier name").required(),
        Field::text("contact_email", "Contact email"),
        Field::text("phone", "Phone number"),
        Field::one_of("status", "Supplier status", ACTIVE_STATES).default(Literal::Str("active")),
    ],
    unique: &["name"],
    timestamps: true,
    dependents: &[Dependent {
        collection: "products",
        field: "supplier_id",
        label: "products",
        active: Active::StatusIn(&["active"]),
    }],
    owned: &[],
};

static PRODUCT: EntitySpec = EntitySpec {
    collection: "products",
    label: "Product",
    ids: IdScheme::Prefixed {
        prefix: "PRD",
        width: 4,
    },
    id_field: "product_id",
    id_param: "product_id",
    fields: &[
        Field::text("name", "Product name").required(),
        Field::text("sku", "Stock keeping unit").required(),
        Field::text("category", "Product category"),
        Field::number("price", "Unit price").rule(Rule::Positive).required(),
        Field::integer("stock_quantity", "Units on hand")
            .rule(Rule::NonNegative)
            .default(Literal::Int(0)),
        Field::reference("supplier_id", "Supplying vendor", "suppliers", "Supplier"),
        Field::one_of("status", "Product status", &["active", "discontinued"])
            .default(Literal::Str("active")),
    ],
    unique: &["sku"],
    timestamps: true,
    dependents: &[],
    owned: &[],
};

static WAREHOUSE: EntitySpec = EntitySpec {
    collection: "warehouses",
    label: "Warehouse",
    ids: IdScheme::Prefixed {
        prefix: "WH",
        width: 3,
    },
    id_field: "warehouse_id",
    id_param: "warehouse_id",
    fields: &[
        Field::text("name", "Warehouse name").required(),
        Field::text("location", "City or region"),
        Field::integer("capacity", "Storage capacity").rule(Rule::NonNegative),
    ],
    unique: &["name"],
    timestamps: false,
    dependents: &[],
    owned: &[],
};

static SALES_ORDER_SPEC: EntitySpec = EntitySpec {
    collection: "sales_orders",
    label: "Sales order",
    ids: IdScheme::Prefixed {
        prefix: "SO",
        width: 4,
    },
    id_field: "sales_order_id",
    id_param: "sales_order_id",
    fields: &[
        Field::reference("customer_id", "Ordering customer", "customers", "Customer").required(),
        Field::list(
            "items",
            "Line items: [{\"product_id\": \"PRD0001\", \"quantity\": 2}]",
        )
        .required(),
        Field::text("shipping_address", "Delivery address"),
        Field::one_of("status", "Order status", &["Pending", "Shipped", "Delivered", "Cancelled"])
            .system(Literal::Str("Pending")),
        Field::number("total_amount", "Order total").system(Literal::Num(0.0)),
        Field::text("cancel_reason", "Reason given on cancellation").system(Literal::Null),
    ],
    unique: &[],
    timestamps: true,
    dependents: &[],
    owned: &[],
};

static SHIPMENT_SPEC: EntitySpec = EntitySpec {
    collection: "shipments",
    label: "Shipment",
    ids: IdScheme::Prefixed {
        prefix: "SH",
        width: 4,
    },
    id_field: "shipment_id",
    id_param: "shipment_id",
    fields: &[
        Field::reference("sales_order_id", "Order being shipped", "sales_orders", "Sales order")
            .required(),
        Field::text("carrier", "Carrier name").required(),
        Field::reference("warehouse_id", "Origin warehouse", "warehouses", "Warehouse"),
        Field::text("tracking_number", "Carrier tracking number"),
        Field::one_of("status", "Shipment status", &["Preparing", "In Transit", "Delivered"])
            .system(Literal::Str("Preparing")),
    ],
    unique: &["sales_order_id"],
    timestamps: true,
    dependents: &[],
    owned: &[],
};

static PURCHASE_ORDER_SPEC: EntitySpec = EntitySpec {
    collection: "purchase_orders",
    label: "Purchase order",
    ids: IdScheme::Prefixed {
        prefix: "PO",
        width: 4,
    },
    id_field: "purchase_order_id",
    id_param: "purchase_order_id",
    fields: &[
        Field::reference("supplier_id", "Supplier", "suppliers", "Supplier").required(),
        Field::reference("product_id", "Product to restock", "products", "Product").required(),
        Field::integer("quantity", "Units ordered").rule(Rule::Positive).required(),
        Field::number("unit_cost", "Cost per unit").rule(Rule::Positive).required(),
        Field::reference("warehouse_id", "Receiving warehouse", "warehouses", "Warehouse"),
        Field::one_of("status", "Purchase order status", &["Pending", "Received", "Cancelled"])
            .system(Literal::Str("Pending")),
        Field::number("total_cost", "Quantity times unit cost").system(Literal::Num(0.0)),
    ],
    unique: &[],
    timestamps: true,
    dependents: &[],
    owned: &[],
};

pub fn operations() -> Vec<Operation> {
    vec![
        shapes::create(&CUSTOMER, "create_customer", "Create a customer. The email must be unique."),
        shapes::get(&CUSTOMER, "get_customer", "Get a customer by id."),
        shapes::update(&CUSTOMER, "update_customer", "Update customer contact details or status."),
        shapes::search(
            &CUSTOMER,
            "search_customers",
            "Search customers by status, name or email.",
            SearchSpec::equals(&["status"])
                .contains(&[("name_contains", &["name"]), ("email_contains", &["email"])]),
        ),
        shapes::create(&SUPPLIER, "create_supplier", "Register a supplier."),
        shapes::get(&SUPPLIER, "get_supplier", "Get a supplier by id."),
        shapes::update(&SUPPLIER, "update_supplier", "Update supplier details or status."),
        shapes::search(
            &SUPPLIER,
            "search_suppliers",
            "Search suppliers by status or name.",
            SearchSpec::equals(&["status"]).contains(&[("name_contains", &["name"])]),
        ),
        shapes::delete(
            &SUPPLIER,
            "delete_supplier",
            "Delete a supplier that no longer supplies any active product.",
            &[],
        ),
        shapes::create(&PRODUCT, "create_product", "Create a product. The SKU must be unique."),
        shapes::get(&PRODUCT, "get_product", "Get a product by id."),
        shapes::update(&PRODUCT, "update_product", "Update product price, stock, supplier or status."),
        shapes::search(
            &PRODUCT,
            "search_products",
            "Search products by category, supplier, status or name.",
            SearchSpec::equals(&["category", "supplier_id", "status"])
                .contains(&[("name_contains", &["name"])]),
        ),
        shapes::search(
            &WAREHOUSE,
            "search_warehouses",
            "Search warehouses by location or name.",
            SearchSpec::equals(&["location"]).contains(&[("name_contains", &["name"])]),
        ),
        create_sales_order(),
        shapes::get(&SALES_ORDER_SPEC, "get_sales_order", "Get a sales order by id."),
        shapes::search(
            &SALES_ORDER_SPEC,
            "search_sales_orders",
            "Search sales orders by customer or status, newest first.",
            SearchSpec::equals(&["customer_id", "status"]).sort("created_at", true),
        ),
        cancel_order(),
        create_shipment(),
        ship_order(),
        deliver_order(),
        create_purchase_order(),
        shapes::advance(
            &PURCHASE_ORDER_SPEC,
            "cancel_purchase_order",
            "Cancel a pending purchase order.",
            PURCHASE_ORDER,
            "Cancelled",
            &[],
        ),
        fulfill_purchase_order(),
        shapes::summarize(
            &SALES_ORDER_SPEC,
            "summarize_sales_orders",
            "Count sales orders and total their amounts by status.",
            SummarySpec {
                group_by: "status",
                sums: &[("total_amount", "total_amount")],
                filters: &["customer_id"],
            },
        ),
    ]
}

fn create_sales_order() -> Operation {
    Operation::new(
        "create_sales_order",
        "Create a pending sales order for an active customer. Stock is reserved immediately; every product must be active and in stock.",
        Effect::Write,
        |ctx, args| {
            let mut record = build_record(ctx.store, ctx.clock, &SALES_ORDER_SPEC, args)?;
            let customer_id = args.id("customer_id")?;
            let customer = require_exists(ctx.store, "customers", "Customer", &customer_id)?;
            if status(customer) != "active" {
                return Err(ToolError::precondition(format!(
                    "Customer {customer_id} is not active"
                )));
            }
            let demand = order_items(args.value("items"))?;
            let mut items = Vec::new();
            let mut total = 0.0;
            for (product_id, quantity) in &demand {
                let product = fetch(ctx.store, &PRODUCT, product_id)?;
                if status(&product) != "active" {
                    return Err(ToolError::precondition(format!(
                        "Product {product_id} is not active"
                    )));
                }
                let available = stock(&product);
                if available < *quantity {
                    return Err(ToolError::precondition(format!(
                        "Insufficient stock for product {product_id}: requested {quantity}, available {available}"
                    )));
                }
                let price = number(&product, "price").unwrap_or(0.0);
                total += price * *quantity as f64;
                items.push(json!({ "product_id": product_id, "quantity": quantity, "unit_price": price }));
            }
            adjust_stock(ctx, &demand, -1)?;
            set(&mut record, "items", Value::Array(items));
            set(&mut record, "total_amount", money(total));
            let (_, record) = insert_new(ctx, &SALES_ORDER_SPEC, record)?;
            Ok(Value::Object(record))
        },
    )
    .params(create_params(&SALES_ORDER_SPEC))
}

fn cancel_order() -> Operation {
    Operation::new(
        "cancel_order",
        "Cancel a sales order. Only Pending orders can be cancelled; reserved stock is released.",
        Effect::Write,
        |ctx, args| {
            let id = args.id("sales_order_id")?;
            let reason = args.str("reason")?;
            let order = fetch(ctx.store, &SALES_ORDER_SPEC, &id)?;
            let current = status(&order);
            if current != "Pending" {
                return Err(ToolError::precondition(format!(
                    "cannot cancel sales order {id}: status is '{current}'"
                )));
            }
            SALES_ORDER.check(current, "Cancelled")?;
            let demand = match order.get("items") {
                None | Some(Value::Null) => BTreeMap::new(),
                Some(items) => parse_items(items)?,
            };
            adjust_stock(ctx, &demand, 1)?;
            let clock = ctx.clock;
            let order = ctx
                .store
                .get_mut(SALES_ORDER_SPEC.collection, &id)
                .ok_or_else(|| SALES_ORDER_SPEC.not_found(&id))?;
            set(order, "status", "Cancelled");
            set(order, "cancel_reason", reason);
            touch(order, clock);
            Ok(Value::Object(order.clone()))
        },
    )
    .param(id_param(&SALES_ORDER_SPEC))
    .param(ParamSpec::required(
        "reason",
        ParamType::String,
        "Why the order is cancelled",
    ))
}

fn create_shipment() -> Operation {
    Operation::new(
        "create_shipment",
        "Create the shipment for a Pending sales order. Each order has at most one shipment.",
        Effect::Write,
        |ctx, args| {
            let record = build_record(ctx.store, ctx.clock, &SHIPMENT_SPEC, args)?;
            let order_id = args.id("sales_order_id")?;
            let order = fetch(ctx.store, &SALES_ORDER_SPEC, &order_id)?;
            if status(&order) != "Pending" {
                return Err(ToolError::precondition(format!(
                    "Shipments can only be created for Pending orders; sales order {order_id} is '{}'",
                    status(&order)
                )));
            }
            let (_, record) = insert_new(ctx, &SHIPMENT_SPEC, record)?;
            Ok(Value::Object(record))
        },
    )
    .params(create_params(&SHIPMENT_SPEC))
}

fn ship_order() -> Operation {
    Operation::new(
        "ship_order",
        "Mark a Pending sales order as Shipped and move its shipment from Preparing to In Transit.",
        Effect::Write,
        |ctx, args| {
            let id = args.id("sales_order_id")?;
            let order = fetch(ctx.store, &SALES_ORDER_SPEC, &id)?;
            SALES_ORDER.check(status(&order), "Shipped")?;
            let (shipment_key, shipment) = shipment_for(ctx, &id)?;
            SHIPMENT.check(status(&shipment), "In Transit")?;
            let now = ctx.clock.now().to_string();
            let clock = ctx.clock;
            let shipment = ctx
                .store
                .get_mut(SHIPMENT_SPEC.collection, &shipment_key)
                .ok_or_else(|| SHIPMENT_SPEC.not_found(&shipment_key))?;
            set(shipment, "status", "In Transit");
            touch(shipment, clock);
            let order = ctx
                .store
                .get_mut(SALES_ORDER_SPEC.collection, &id)
                .ok_or_else(|| SALES_ORDER_SPEC.not_found(&id))?;
            set(order, "status", "Shipped");
            set(order, "shipped_at", now);
            touch(order, clock);
            Ok(Value::Object(order.clone()))
        },
    )
    .param(id_param(&SALES_ORDER_SPEC))
}

fn deliver_order() -> Operation {
    Operation::new(
        "deliver_order",
        "Mark a Shipped sales order as Delivered. Its shipment must be In Transit.",
        Effect::Write,
        |ctx, args| {
            let id = args.id("sales_order_id")?;
            let order = fetch(ctx.store, &SALES_ORDER_SPEC, &id)?;
            if status(&order) != "Shipped" {
                return Err(ToolError::precondition(format!(
                    "Sales order {id} must be Shipped to deliver; status is '{}'",
                    status(&order)
                )));
            }
            let (shipment_key, shipment) = shipment_for(ctx, &id)?;
            if status(&shipment) != "In Transit" {
                return Err(ToolError::precondition(format!(
                    "Shipment {shipment_key} must be In Transit to deliver; status is '{}'",
                    status(&shipment)
                )));
            }
            SALES_ORDER.check("Shipped", "Delivered")?;
            SHIPMENT.check("In Transit", "Delivered")?;
            let now = ctx.clock.now().to_string();
            let clock = ctx.clock;
            let shipment = ctx
                .store
                .get_mut(SHIPMENT_SPEC.collection, &shipment_key)
                .ok_or_else(|| SHIPMENT_SPEC.not_found(&shipment_key))?;
            set(shipment, "status", "Delivered");
            touch(shipment, clock);
            let order = ctx
                .store
                .get_mut(SALES_ORDER_SPEC.collection, &id)
                .ok_or_else(|| SALES_ORDER_SPEC.not_found(&id))?;
            set(order, "status", "Delivered");
            set(order, "delivered_at", now);
            touch(order, clock);
            Ok(Value::Object(order.clone()))
        },
    )
    .param(id_param(&SALES_ORDER_SPEC))
}

fn create_purchase_order() -> Operation {
    Operation::new(
        "create_purchase_order",
        "Create a pending purchase order with an active supplier for one of its products.",
        Effect::Write,
        |ctx, args| {
            let mut record = build_record(ctx.store, ctx.clock, &PURCHASE_ORDER_SPEC, args)?;
            let supplier_id = args.id("supplier_id")?;
            let product_id = args.id("product_id")?;
            let supplier = fetch(ctx.store, &SUPPLIER, &supplier_id)?;
            if status(&supplier) != "active" {
                return Err(ToolError::precondition(format!(
                    "Supplier {supplier_id} is not active"
                )));
            }
            let product = fetch(ctx.store, &PRODUCT, &product_id)?;
            let owner = product
                .get("supplier_id")
                .filter(|value| !value.is_null())
                .map(scalar_text);
            if owner.is_some_and(|owner| owner != supplier_id) {
                return Err(ToolError::precondition(format!(
                    "Product {product_id} is not supplied by supplier {supplier_id}"
                )));
            }
            let quantity = args.i64("quantity")?;
            let unit_cost = args.f64("unit_cost")?;
            set(&mut record, "total_cost", money(quantity as f64 * unit_cost));
            let (_, record) = insert_new(ctx, &PURCHASE_ORDER_SPEC, record)?;
            Ok(Value::Object(record))
        },
    )
    .params(create_params(&PURCHASE_ORDER_SPEC))
}

fn fulfill_purchase_order() -> Operation {
    Operation::new(
        "fulfill_purchase_order",
        "Receive a pending purchase order and add its quantity to the product's stock.",
        Effect::Write,
        |ctx, args| {
            let id = args.id("purchase_order_id")?;
            let order = shapes::transition(ctx, &PURCHASE_ORDER_SPEC, PURCHASE_ORDER, &id, "Received")?;
            let product_id = order
                .get("product_id")
                .map(scalar_text)
                .unwrap_or_default();
            let quantity = order.get("quantity").and_then(Value::as_i64).unwrap_or(0);
            adjust_stock(ctx, &BTreeMap::from([(product_id, quantity)]), 1)?;
            let now = ctx.clock.now().to_string();
            let order = ctx
                .store
                .get_mut(PURCHASE_ORDER_SPEC.collection, &id)
                .ok_or_else(|| PURCHASE_ORDER_SPEC.not_found(&id))?;
            set(order, "received_at", now);
            Ok(Value::Object(order.clone()))
        },
    )
    .param(id_param(&PURCHASE_ORDER_SPEC))
}

/// Line items as `product_id -> total quantity`.
/// Line items of a new order: present and non-empty.
fn order_items(value: Option<&Value>) -> ToolResult<BTreeMap<String, i64>> {
    let items = value
        .filter(|items| items.as_array().is_some_and(|items| !items.is_empty()))
        .ok_or_else(|| ToolError::invalid_argument("items must be a non-empty list"))?;
    parse_items(items)
}

/// Demand per product. An empty list is no demand.
fn parse_items(value: &Value) -> ToolResult<BTreeMap<String, i64>> {
    let items = value
        .as_array()
        .ok_or_else(|| ToolError::invalid_argument("items must be a list"))?;
    let mut demand = BTreeMap::new();
    for item in items {
        let product_id = item
            .get("product_id")
            .filter(|value| value.is_string() || value.is_u64())
            .map(scalar_text)
            .ok_or_else(|| ToolError::invalid_argument("Each item needs a product_id"))?;
        let quantity = item
            .get("quantity")
            .and_then(Value::as_i64)
            .filter(|quantity| *quantity > 0)
            .ok_or_else(|| {
                ToolError::invalid_argument("Each item needs a positive integer quantity")
            })?;
        *demand.entry(product_id).or_insert(0) += quantity;
    }
    Ok(demand)
}

fn stock(product: &Record) -> i64 {
    number(product, "stock_quantity").unwrap_or(0.0) as i64
}

/// Add `sign * quantity` to each product's stock.
fn adjust_stock(ctx: &mut ToolContext<'_>, demand: &BTreeMap<String, i64>, sign: i64) -> ToolResult<()> {
    let clock = ctx.clock;
    for (product_id, quantity) in demand {
        let product = ctx
            .store
            .get_mut(PRODUCT.collection, product_id)
            .ok_or_else(|| PRODUCT.not_found(product_id))?;
        let updated = stock(product) + sign * quantity;
        set(product, "stock_quantity", updated);
        touch(product, clock);
    }
    Ok(())
}

fn shipment_for(ctx: &ToolContext<'_>, order_id: &str) -> ToolResult<(String, Record)> {
    let wanted = Value::String(order_id.to_string());
    let filters = Filters::default().equal("sales_order_id", &wanted);
    let shipments = filter_and_match(ctx.store.collection(SHIPMENT_SPEC.collection), &filters);
    let shipment = shipments.first().ok_or_else(|| {
        ToolError::precondition(format!("No shipment exists for sales order {order_id}"))
    })?;
    let key = shipment
        .get(SHIPMENT_SPEC.id_field)
        .filter(|key| !key.is_null())
        .map(scalar_text)
        .filter(|key| !key.is_empty())
        .ok_or_else(|| {
            ToolError::precondition(format!(
                "Shipment for sales order {order_id} has no {}",
                SHIPMENT_SPEC.id_field
            ))
        })?;
    Ok((key, (*shipment).clone()))
}
