pub mod confirm_duplicate_command;
pub mod transition_shipment_status_command;
