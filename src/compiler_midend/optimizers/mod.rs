pub mod temp_slot;
