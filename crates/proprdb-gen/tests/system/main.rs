//! System tests over the checked-in generator output for `system.proto`.
//!
//! `payloads.rs` stands in for the prost-build output; `system.proprdb.rs`
//! is the committed output of protoc-gen-proprdb for the same file.


mod crud;
mod sync_jsonl;

impl proprdb_rt::ValidateWrite for payloads::Person {
    fn valid(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("name is required".to_string());
        }
        Ok(())
    }
}
