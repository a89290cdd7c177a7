pub mod sweep_due_events;
