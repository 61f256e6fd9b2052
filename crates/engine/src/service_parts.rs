//! Parts consumed by a service order, priced at the time of use.

use sea_orm::entity::prelude::*;

use crate::ServicePart;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "service_parts")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub service_order_id: Uuid,
    pub product_id: Uuid,
    pub quantity: i64,
    pub unit_price_minor: i64,
    pub unit_cost_minor: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::service_orders::Entity",
        from = "Column::ServiceOrderId",
        to = "super::service_orders::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    ServiceOrders,
}

impl Related<super::service_orders::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ServiceOrders.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for ServicePart {
    fn from(model: Model) -> Self {
        Self {
            product_id: model.product_id,
            quantity: model.quantity,
            unit_price_minor: model.unit_price_minor,
            unit_cost_minor: model.unit_cost_minor,
        }
    }
}
