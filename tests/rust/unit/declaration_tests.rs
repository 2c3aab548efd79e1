//! Declaration errors surfaced through the public builder API

#[cfg(test)]
mod declaration_tests {
    use relgraph::config::CompilerConfig;
    use relgraph::entity::{EntityCatalog, EntityRef, EntitySchema, PropertyType};
    use relgraph::relation::{ErrorKind, Relation, RelationError};

    fn catalog() -> (EntityRef, EntityRef, EntityRef) {
        let catalog = EntityCatalog::new();
        let authors = catalog
            .virtual_entity(
                "authors",
                EntitySchema::new()
                    .with("id", PropertyType::Integer)
                    .with("name", PropertyType::String),
                Some(vec!["id".to_string()]),
            )
            .unwrap();
        let authorships = catalog
            .virtual_entity(
                "authorships",
                EntitySchema::new()
                    .with("author_id", PropertyType::Integer)
                    .with("book_isbn", PropertyType::String)
                    .with("book_edition", PropertyType::Integer),
                None,
            )
            .unwrap();
        let books = catalog
            .virtual_entity(
                "books",
                EntitySchema::new()
                    .with("isbn", PropertyType::String)
                    .with("edition", PropertyType::Integer)
                    .with("title", PropertyType::String),
                Some(vec!["isbn".to_string(), "edition".to_string()]),
            )
            .unwrap();
        (authors, authorships, books)
    }

    #[test]
    fn test_composite_keys_join_on_every_component() {
        let (authors, authorships, books) = catalog();
        let relation = Relation::create_on(&authors, &[])
            .unwrap()
            .via(
                &authorships,
                &["author_id"],
                &["book_isbn", "book_edition"],
                Some("written"),
            )
            .unwrap()
            .from(&books, &["isbn", "edition"])
            .unwrap();

        let plan = relation.compile_query(None).unwrap();
        assert_eq!(plan.joins[1].joining_on.len(), 2);
        assert!(relation.references()[1].referencing_is_left_to_right());
    }

    #[test]
    fn test_composite_source_needs_explicit_property() {
        let (authors, authorships, books) = catalog();
        let err = Relation::create_on(&authors, &[])
            .unwrap()
            .via(&authorships, &["author_id"], &["book_isbn", "book_edition"], None)
            .unwrap()
            .from(&books, &[])
            .unwrap_err();
        assert!(matches!(err, RelationError::AmbiguousIdentifier { .. }));
        assert_eq!(err.kind(), ErrorKind::Declaration);
    }

    #[test]
    fn test_width_mismatch() {
        let (authors, authorships, books) = catalog();
        let err = Relation::create_on(&authors, &[])
            .unwrap()
            .via(&authorships, &["author_id"], &["book_isbn"], None)
            .unwrap()
            .from(&books, &["isbn", "edition"])
            .unwrap_err();
        assert!(matches!(err, RelationError::WidthMismatch { .. }));
    }

    #[test]
    fn test_ambiguous_direction() {
        let (authors, _, books) = catalog();

        let err = Relation::create_on(&authors, &["id"])
            .unwrap()
            .from(&authors, &["id"])
            .unwrap_err();
        assert!(err.to_string().contains("both sides"));

        let err = Relation::create_on(&authors, &["name"])
            .unwrap()
            .from(&books, &["title"])
            .unwrap_err();
        assert!(matches!(err, RelationError::AmbiguousDirection { .. }));
        assert!(err.to_string().contains("neither side"));
    }

    #[test]
    fn test_composite_id_listed_out_of_order_is_still_referenced() {
        let (_, authorships, books) = catalog();
        let relation = Relation::create_on(&authorships, &["book_edition", "book_isbn"])
            .unwrap()
            .from(&books, &["edition", "isbn"])
            .unwrap();

        assert!(relation.references()[0].referencing_is_left_to_right());
        let sql = relation
            .compile_query(None)
            .unwrap()
            .to_sql(relgraph::SqlDialect::Ansi)
            .to_sql();
        assert!(sql.contains(
            "ON \"target\".\"book_edition\" = \"source\".\"edition\" AND \"target\".\"book_isbn\" = \"source\".\"isbn\"\n"
        ));
    }

    #[test]
    fn test_reverse_chain_over_composite_target() {
        let (authors, authorships, books) = catalog();
        let relation = Relation::create_on(&books, &["isbn", "edition"])
            .unwrap()
            .via(&authorships, &["book_isbn", "book_edition"], &["author_id"], None)
            .unwrap()
            .from(&authors, &[])
            .unwrap();

        let plan = relation
            .compile_query(Some(&relgraph::entity::EntityId::from(vec![
                serde_json::json!("978-0"),
                serde_json::json!(2),
            ])))
            .unwrap();
        assert_eq!(plan.filters.len(), 2);
        assert_eq!(
            plan.params(),
            vec![serde_json::json!("978-0"), serde_json::json!(2)]
        );
    }

    #[test]
    fn test_invalid_config_is_rejected_up_front() {
        let (authors, _, _) = catalog();
        let config = CompilerConfig {
            target_alias: "same".to_string(),
            source_alias: "same".to_string(),
            ..Default::default()
        };
        let err = Relation::create_on_with_config(&config, &authors, &[]).unwrap_err();
        assert!(err.to_string().contains("invalid compiler configuration"));
    }

    #[test]
    fn test_catalog_rejects_conflicting_definitions() {
        let catalog = EntityCatalog::new();
        let schema = EntitySchema::new().with("id", PropertyType::Integer);
        let first = catalog.virtual_entity("tags", schema.clone(), None).unwrap();
        let again = catalog.virtual_entity("tags", schema, None).unwrap();
        assert!(std::sync::Arc::ptr_eq(&first, &again));

        let err = catalog
            .virtual_entity(
                "tags",
                EntitySchema::new().with("id", PropertyType::String),
                None,
            )
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Declaration);
        assert_eq!(catalog.len(), 1);
    }
}
