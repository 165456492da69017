pub mod commit_inbound_record_command;
