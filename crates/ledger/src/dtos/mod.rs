pub mod ledger_dto;
