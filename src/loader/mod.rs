mod init_expr;
mod module;
mod sections;
mod stream;

pub use init_expr::ConstExpr;
pub use module::{
    DataMode, DataSegment, ElementMode, ElementSegment, ExportEntry, ExternalKind, FuncType,
    FunctionEntry, FunctionOrigin, GlobalDecl, GlobalOrigin, Limits, MemoryDecl, Module, TableDecl,
};
pub use sections::{Section, SectionKind};
#[cfg(feature = "std")]
pub use stream::FileSource;
pub use stream::{ByteSource, LoaderError, MemorySource, SourceReader};

#[cfg(test)]
mod tests {
    use super::*;

    fn module_from_wat(wat: &str) -> Module {
        let bytes = wat::parse_str(wat).unwrap();
        Module::from_bytes(bytes).unwrap()
    }

    #[test]
    fn loads_a_small_module() {
        let module = module_from_wat(
            r#"
(module
  (import "env" "host_add" (func (param i32 i32) (result i32)))
  (memory 1 2)
  (global $g (mut i32) (i32.const 5))
  (func (export "run") (result i32)
    i32.const 7
    i32.const 5
    call 0)
  (table 4 funcref)
)"#,
        );
        assert_eq!(module.types().len(), 2);
        assert_eq!(module.functions().len(), 2);
        assert_eq!(module.num_imported_functions(), 1);
        assert_eq!(module.memories().len(), 1);
        assert_eq!(module.memories()[0].limits.min, 1);
        assert_eq!(module.memories()[0].limits.max, Some(2));
        assert_eq!(module.globals().len(), 1);
        assert!(module.globals()[0].mutable);
        assert_eq!(module.exported_function("run"), Some(1));
        assert_eq!(module.exported_function("missing"), None);
        assert!(module.function(1).map(|f| !f.is_imported()).unwrap());
        assert!(module.body_range(0).is_none());
        assert!(module.body_range(1).is_some());
    }

    #[test]
    fn imports_precede_defined_entries() {
        let module = module_from_wat(
            r#"
(module
  (import "env" "f" (func))
  (func)
)"#,
        );
        assert!(module.functions()[0].is_imported());
        assert!(!module.functions()[1].is_imported());
    }

    #[test]
    fn rejects_bad_magic() {
        assert!(Module::from_bytes(alloc::vec![0u8; 12]).is_err());
        assert!(Module::from_bytes(alloc::vec![0u8; 2]).is_err());
    }

    #[test]
    fn rejects_bad_version() {
        let bytes = alloc::vec![0x00, 0x61, 0x73, 0x6D, 0x02, 0x00, 0x00, 0x00];
        assert!(matches!(
            Module::from_bytes(bytes),
            Err(LoaderError::Malformed(_))
        ));
    }

    #[test]
    fn function_for_offset_maps_back() {
        let module = module_from_wat(
            r#"
(module
  (func (result i32) i32.const 1)
  (func (result i32) i32.const 2)
)"#,
        );
        let (off0, size0) = module.body_range(0).unwrap();
        let (off1, _) = module.body_range(1).unwrap();
        assert_eq!(module.function_for_offset(off0), Some((0, 0)));
        assert_eq!(module.function_for_offset(off0 + size0 as u64 - 1), Some((0, size0 - 1)));
        assert_eq!(module.function_for_offset(off1 + 1), Some((1, 1)));
        assert_eq!(module.function_for_offset(0), None);
    }

    #[test]
    fn parses_segments() {
        let module = module_from_wat(
            r#"
(module
  (memory 1)
  (table 4 funcref)
  (func $f)
  (elem (i32.const 1) $f)
  (elem funcref (ref.func $f) (ref.null func))
  (data (i32.const 0) "abc")
  (data "pq")
)"#,
        );
        assert_eq!(module.elements().len(), 2);
        assert!(matches!(module.elements()[0].mode, ElementMode::Active { .. }));
        assert!(matches!(module.elements()[1].mode, ElementMode::Passive));
        assert_eq!(module.data_segments().len(), 2);
        let bytes = module.load_data_bytes(&module.data_segments()[0]).unwrap();
        assert_eq!(bytes, b"abc");
        let bytes = module.load_data_bytes(&module.data_segments()[1]).unwrap();
        assert_eq!(bytes, b"pq");
    }

    #[test]
    fn memory64_flag_is_honoured() {
        let module = module_from_wat(r#"(module (memory i64 3))"#);
        assert!(module.memories()[0].is_memory64);
        assert_eq!(module.memories()[0].limits.min, 3);
    }
}
