pub mod defer;
pub mod irq_guard;
pub mod sync_cell;
