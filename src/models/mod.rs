// Declared manifest
pub mod shipment_line;

// Intake results
pub mod inbound_record;

// External reference data
pub mod order_record;
pub mod product_part;

pub use inbound_record::Grade;
pub use shipment_line::ShipmentStatus;

pub type ShipmentLine = shipment_line::Model;
pub type InboundRecord = inbound_record::Model;
pub type OrderRecord = order_record::Model;
pub type ProductPart = product_part::Model;
