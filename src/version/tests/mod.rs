mod tests_version_edit;
mod tests_builder;
mod tests_compaction;
