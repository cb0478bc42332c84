//! Shared fixture model for binding tests

#![allow(dead_code)]

use odata_uri_edm::{
    ComplexType, CsdlModel, EdmPrimitiveKind as K, EdmTypeRef, EntitySet, EntityType, Multiplicity,
    NavigationProperty, Operation, OperationImport, OperationKind, Property, Singleton,
};

/// A small sales model:
///
/// - `Customers` of `Sales.Customer` (open derived `Sales.VipCustomer`)
/// - `Orders` of `Sales.Order`, `OrderLines` with a composite key
/// - `Products` keyed by a string, open type
/// - singleton `Me`, bound functions and an action, two imports
pub fn sales_model() -> CsdlModel {
    let mut me = Singleton::new("Me", "Sales.Customer");
    me.navigation_bindings.insert("Orders".into(), "Orders".into());

    CsdlModel::builder("Sales")
        .complex_type(
            ComplexType::new("Sales.Address")
                .with_property(Property::new("Street", K::String))
                .with_property(Property::new("City", K::String))
                .with_property(Property::new("Zip", K::String)),
        )
        .entity_type(
            EntityType::new("Sales.Customer")
                .with_key("Id")
                .with_property(Property::new("Id", K::Int32).not_null())
                .with_property(Property::new("Name", K::String))
                .with_property(Property::new("Age", K::Int16))
                .with_property(Property::new("Rating", K::Double))
                .with_property(Property::new("Balance", K::Decimal))
                .with_property(Property::new("Since", K::DateTimeOffset))
                .with_property(Property::new("Photo", K::Binary))
                .with_property(Property::new("Address", EdmTypeRef::complex("Sales.Address")))
                .with_property(Property::new(
                    "Emails",
                    EdmTypeRef::collection(EdmTypeRef::primitive(K::String)),
                ))
                .with_navigation(NavigationProperty::new("Orders", "Sales.Order", Multiplicity::Many))
                .with_navigation(NavigationProperty::new(
                    "BestFriend",
                    "Sales.Customer",
                    Multiplicity::ZeroOrOne,
                )),
        )
        .entity_type(
            EntityType::new("Sales.VipCustomer")
                .with_base("Sales.Customer")
                .with_property(Property::new("Level", K::Int32))
                .open(),
        )
        .entity_type(
            EntityType::new("Sales.Order")
                .with_key("Id")
                .with_property(Property::new("Id", K::Int32).not_null())
                .with_property(Property::new("Amount", K::Decimal))
                .with_property(Property::new("Placed", K::DateTime))
                .with_property(Property::new("Shipped", K::Boolean))
                .with_navigation(NavigationProperty::new("Items", "Sales.OrderLine", Multiplicity::Many))
                .with_navigation(NavigationProperty::new("Customer", "Sales.Customer", Multiplicity::One)),
        )
        .entity_type(
            EntityType::new("Sales.OrderLine")
                .with_key("OrderId")
                .with_key("LineNo")
                .with_property(Property::new("OrderId", K::Int32).not_null())
                .with_property(Property::new("LineNo", K::Int16).not_null())
                .with_property(Property::new("Product", K::String))
                .with_property(Property::new("Quantity", K::Int32)),
        )
        .entity_type(
            EntityType::new("Sales.Product")
                .with_key("Code")
                .with_property(Property::new("Code", K::String).not_null())
                .with_property(Property::new("Price", K::Double))
                .open(),
        )
        .entity_set(
            EntitySet::new("Customers", "Sales.Customer")
                .with_binding("Orders", "Orders")
                .with_binding("BestFriend", "Customers"),
        )
        .entity_set(
            EntitySet::new("Orders", "Sales.Order")
                .with_binding("Items", "OrderLines")
                .with_binding("Customer", "Customers"),
        )
        .entity_set(EntitySet::new("OrderLines", "Sales.OrderLine"))
        .entity_set(EntitySet::new("Products", "Sales.Product"))
        .singleton(me)
        .operation(
            Operation::function(
                "Sales.TopOrders",
                EdmTypeRef::collection(EdmTypeRef::entity("Sales.Order")),
            )
            .bound_to(EdmTypeRef::entity("Sales.Customer"))
            .with_parameter("count", K::Int32),
        )
        .operation(
            Operation::function(
                "Sales.OrdersBetween",
                EdmTypeRef::collection(EdmTypeRef::entity("Sales.Order")),
            )
            .bound_to(EdmTypeRef::entity("Sales.Customer"))
            .with_parameter("low", K::Int32)
            .with_parameter("high", K::Int32),
        )
        .operation(
            Operation::function("Sales.TotalSpent", EdmTypeRef::primitive(K::Decimal))
                .bound_to(EdmTypeRef::entity("Sales.Customer")),
        )
        .operation(
            Operation::function("Sales.MostValuable", EdmTypeRef::entity("Sales.Customer"))
                .bound_to(EdmTypeRef::collection(EdmTypeRef::entity("Sales.Customer"))),
        )
        .operation(
            Operation::action("Sales.Discount")
                .bound_to(EdmTypeRef::entity("Sales.Order"))
                .with_parameter("percent", K::Int32),
        )
        .operation(
            Operation::function(
                "Sales.NearestCustomers",
                EdmTypeRef::collection(EdmTypeRef::entity("Sales.Customer")),
            )
            .with_parameter("city", K::String),
        )
        .operation(Operation::action("Sales.ResetData"))
        .operation_import(OperationImport {
            name: "NearestCustomers".into(),
            operation: "Sales.NearestCustomers".into(),
            kind: OperationKind::Function,
            entity_set: Some("Customers".into()),
        })
        .operation_import(OperationImport {
            name: "ResetData".into(),
            operation: "Sales.ResetData".into(),
            kind: OperationKind::Action,
            entity_set: None,
        })
        .build()
        .expect("fixture model is valid")
}
