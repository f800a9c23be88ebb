pub mod tape_table;
