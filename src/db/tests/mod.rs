mod tests_batch;
mod tests_snapshot;
mod tests_recovery;
mod tests_compaction;
mod tests_maintenance;
