mod common;

use common::entity;
use once_cell::sync::Lazy;
use sea_hierarchy::{flatten_forest, HierarchyError, HierarchyRepository};
use sea_orm::entity::prelude::*;
use sea_orm::{Database, DatabaseConnection, DbBackend, Set, Statement};

// The suite shares one database; serialize the tests so truncation in one
// does not race the assertions of another.
static DB_GUARD: Lazy<tokio::sync::Mutex<()>> = Lazy::new(|| tokio::sync::Mutex::new(()));

type TestResult = Result<(), Box<dyn std::error::Error>>;

fn node_repo() -> HierarchyRepository<entity::node::Model> {
    HierarchyRepository::new()
}

fn node_attrs(name: &str) -> entity::node::ActiveModel {
    entity::node::ActiveModel {
        name: Set(name.to_owned()),
        ..Default::default()
    }
}

fn folder_attrs(name: &str) -> entity::folder::ActiveModel {
    entity::folder::ActiveModel {
        name: Set(name.to_owned()),
        ..Default::default()
    }
}

#[tokio::test]
async fn create_derives_levels_and_edges() -> TestResult {
    let _guard = DB_GUARD.lock().await;
    let Some(db) = setup_database().await? else {
        return Ok(());
    };

    let repo = node_repo();
    let a = repo.create(&db, node_attrs("a"), None).await?;
    let b = repo.create(&db, node_attrs("b"), Some(a.id)).await?;
    let c = repo.create(&db, node_attrs("c"), Some(b.id)).await?;

    assert_eq!((a.level, b.level, c.level), (0, 1, 2));
    assert_eq!(
        edge_pairs(&db).await?,
        vec![(b.id, a.id), (c.id, a.id), (c.id, b.id)]
    );

    let chain = repo.ancestors(&db, &c).await?;
    let names: Vec<&str> = chain.iter().map(|n| n.name.as_str()).collect();
    assert_eq!(names, vec!["b", "a"]);

    Ok(())
}

#[tokio::test]
async fn reparent_moves_whole_subtree() -> TestResult {
    let _guard = DB_GUARD.lock().await;
    let Some(db) = setup_database().await? else {
        return Ok(());
    };

    let repo = node_repo();
    let a = repo.create(&db, node_attrs("a"), None).await?;
    let b = repo.create(&db, node_attrs("b"), Some(a.id)).await?;
    let c = repo.create(&db, node_attrs("c"), Some(b.id)).await?;
    let d = repo.create(&db, node_attrs("d"), None).await?;
    let e = repo.create(&db, node_attrs("e"), Some(d.id)).await?;

    let moved = repo.reparent(&db, b.id, Some(e.id)).await?;
    assert_eq!(moved.node.parent_id, Some(e.id));
    assert_eq!(moved.node.level, 2);
    assert_eq!(moved.descendants.len(), 1);
    assert_eq!(moved.descendants[0].name, "c");
    assert_eq!(moved.descendants[0].level, 3);

    let expected = vec![
        (b.id, d.id),
        (b.id, e.id),
        (c.id, b.id),
        (c.id, d.id),
        (c.id, e.id),
        (e.id, d.id),
    ];
    assert_eq!(edge_pairs(&db).await?, expected);

    // Re-parenting to the same parent is idempotent in its final state.
    let again = repo.reparent(&db, b.id, Some(e.id)).await?;
    assert_eq!(again.node.level, 2);
    assert_eq!(edge_pairs(&db).await?, expected);
    assert_eq!(levels_by_name(&db).await?, vec![
        ("a".to_owned(), 0),
        ("b".to_owned(), 2),
        ("c".to_owned(), 3),
        ("d".to_owned(), 0),
        ("e".to_owned(), 1),
    ]);

    Ok(())
}

#[tokio::test]
async fn reparent_rejects_cycles_without_touching_state() -> TestResult {
    let _guard = DB_GUARD.lock().await;
    let Some(db) = setup_database().await? else {
        return Ok(());
    };

    let repo = node_repo();
    let a = repo.create(&db, node_attrs("a"), None).await?;
    let b = repo.create(&db, node_attrs("b"), Some(a.id)).await?;
    let c = repo.create(&db, node_attrs("c"), Some(b.id)).await?;

    let edges_before = edge_pairs(&db).await?;
    let levels_before = levels_by_name(&db).await?;

    let err = repo.reparent(&db, a.id, Some(c.id)).await.unwrap_err();
    assert!(matches!(err, HierarchyError::CyclicParent));
    let err = repo.reparent(&db, a.id, Some(a.id)).await.unwrap_err();
    assert!(matches!(err, HierarchyError::CyclicParent));

    assert_eq!(edge_pairs(&db).await?, edges_before);
    assert_eq!(levels_by_name(&db).await?, levels_before);

    Ok(())
}

#[tokio::test]
async fn destroy_cascades_over_the_subtree() -> TestResult {
    let _guard = DB_GUARD.lock().await;
    let Some(db) = setup_database().await? else {
        return Ok(());
    };

    let repo = node_repo();
    let a = repo.create(&db, node_attrs("a"), None).await?;
    let b = repo.create(&db, node_attrs("b"), Some(a.id)).await?;
    repo.create(&db, node_attrs("c"), Some(b.id)).await?;
    let d = repo.create(&db, node_attrs("d"), None).await?;

    let removed = repo.destroy(&db, a.id).await?;
    assert_eq!(removed, 3);

    let survivors = entity::node::Entity::find().all(&db).await?;
    assert_eq!(survivors.len(), 1);
    assert_eq!(survivors[0].id, d.id);
    assert!(edge_pairs(&db).await?.is_empty());

    Ok(())
}

#[tokio::test]
async fn detach_reparents_children_onto_grandparent() -> TestResult {
    let _guard = DB_GUARD.lock().await;
    let Some(db) = setup_database().await? else {
        return Ok(());
    };

    let repo = HierarchyRepository::<entity::folder::Model>::new();
    let a = repo.create(&db, folder_attrs("a"), None).await?;
    let b = repo.create(&db, folder_attrs("b"), Some(a.id)).await?;
    let c = repo.create(&db, folder_attrs("c"), Some(b.id)).await?;

    let removed = repo.destroy(&db, b.id).await?;
    assert_eq!(removed, 1);

    let c = entity::folder::Entity::find_by_id(c.id)
        .one(&db)
        .await?
        .expect("child survives a detach destroy");
    assert_eq!(c.parent_id, Some(a.id));
    assert_eq!(c.level, 1);

    let mut pairs: Vec<(i32, i32)> = entity::folder_edge::Entity::find()
        .all(&db)
        .await?
        .into_iter()
        .map(|e| (e.descendant_id, e.ancestor_id))
        .collect();
    pairs.sort_unstable();
    assert_eq!(pairs, vec![(c.id, a.id)]);

    Ok(())
}

#[tokio::test]
async fn bulk_create_sees_parents_from_the_same_batch() -> TestResult {
    let _guard = DB_GUARD.lock().await;
    let Some(db) = setup_database().await? else {
        return Ok(());
    };

    let repo = node_repo();
    let a = repo.create(&db, node_attrs("a"), None).await?;

    let mut b_attrs = node_attrs("b");
    b_attrs.id = Set(20);
    let mut c_attrs = node_attrs("c");
    c_attrs.id = Set(21);

    let created = repo
        .bulk_create(&db, vec![(b_attrs, Some(a.id)), (c_attrs, Some(20))])
        .await?;
    assert_eq!(created.len(), 2);
    assert_eq!((created[0].level, created[1].level), (1, 2));
    assert_eq!(
        edge_pairs(&db).await?,
        vec![(20, a.id), (21, a.id), (21, 20)]
    );

    // A bad row rolls the whole batch back.
    let before = entity::node::Entity::find().all(&db).await?.len();
    let err = repo
        .bulk_create(&db, vec![(node_attrs("x"), Some(999))])
        .await
        .unwrap_err();
    assert!(matches!(err, HierarchyError::InvalidParent));
    assert_eq!(entity::node::Entity::find().all(&db).await?.len(), before);

    Ok(())
}

#[tokio::test]
async fn bulk_reparent_is_all_or_nothing() -> TestResult {
    let _guard = DB_GUARD.lock().await;
    let Some(db) = setup_database().await? else {
        return Ok(());
    };

    let repo = node_repo();
    let a = repo.create(&db, node_attrs("a"), None).await?;
    let c = repo.create(&db, node_attrs("c"), None).await?;
    let d = repo.create(&db, node_attrs("d"), None).await?;

    let err = repo
        .bulk_reparent(&db, vec![(c.id, Some(a.id)), (d.id, Some(d.id))])
        .await
        .unwrap_err();
    assert!(matches!(err, HierarchyError::CyclicParent));

    // The first move succeeded inside the transaction but must not commit.
    let c = entity::node::Entity::find_by_id(c.id)
        .one(&db)
        .await?
        .expect("node still present");
    assert_eq!(c.parent_id, None);
    assert!(edge_pairs(&db).await?.is_empty());

    let moved = repo
        .bulk_reparent(&db, vec![(c.id, Some(a.id)), (d.id, Some(a.id))])
        .await?;
    assert_eq!(moved.len(), 2);
    assert_eq!(edge_pairs(&db).await?, vec![(c.id, a.id), (d.id, a.id)]);

    Ok(())
}

#[tokio::test]
async fn rebuild_repairs_levels_and_edges() -> TestResult {
    let _guard = DB_GUARD.lock().await;
    let Some(db) = setup_database().await? else {
        return Ok(());
    };

    let repo = node_repo();
    let a = repo.create(&db, node_attrs("a"), None).await?;
    let b = repo.create(&db, node_attrs("b"), Some(a.id)).await?;
    let c = repo.create(&db, node_attrs("c"), Some(b.id)).await?;

    db.execute(Statement::from_string(
        DbBackend::Postgres,
        "DELETE FROM node_edges;",
    ))
    .await?;
    db.execute(Statement::from_string(
        DbBackend::Postgres,
        "UPDATE nodes SET level = 9 WHERE name = 'c';",
    ))
    .await?;

    repo.rebuild(&db).await?;
    let expected = vec![(b.id, a.id), (c.id, a.id), (c.id, b.id)];
    assert_eq!(edge_pairs(&db).await?, expected);
    let c = entity::node::Entity::find_by_id(c.id)
        .one(&db)
        .await?
        .expect("node present");
    assert_eq!(c.level, 2);

    // Idempotent: a second run changes nothing.
    repo.rebuild(&db).await?;
    assert_eq!(edge_pairs(&db).await?, expected);

    // A parent cycle is detected before any write.
    db.execute(Statement::from_string(
        DbBackend::Postgres,
        "UPDATE nodes SET parent_id = (SELECT id FROM nodes WHERE name = 'c') WHERE name = 'a';",
    ))
    .await?;
    let err = repo.rebuild(&db).await.unwrap_err();
    assert!(matches!(err, HierarchyError::CorruptHierarchy(_)));
    assert_eq!(edge_pairs(&db).await?, expected);

    Ok(())
}

#[tokio::test]
async fn forest_and_subtree_reconstruction() -> TestResult {
    let _guard = DB_GUARD.lock().await;
    let Some(db) = setup_database().await? else {
        return Ok(());
    };

    let repo = node_repo();
    let a = repo.create(&db, node_attrs("a"), None).await?;
    repo.create(&db, node_attrs("b"), Some(a.id)).await?;
    repo.create(&db, node_attrs("c"), Some(a.id)).await?;
    let x = repo.create(&db, node_attrs("x"), None).await?;
    repo.create(&db, node_attrs("y"), Some(x.id)).await?;

    let forest = repo.forest(&db).await?;
    assert_eq!(forest.len(), 2);
    assert_eq!(forest[0].record.name, "a");
    let child_names: Vec<&str> = forest[0]
        .children
        .iter()
        .map(|t| t.record.name.as_str())
        .collect();
    assert_eq!(child_names, vec!["b", "c"]);
    assert_eq!(forest[1].record.name, "x");
    assert_eq!(flatten_forest(forest).len(), 5);

    let subtree = repo.subtree(&db, &a).await?;
    assert_eq!(subtree.record.id, a.id);
    assert_eq!(subtree.children.len(), 2);

    Ok(())
}

#[tokio::test]
async fn find_or_create_by_path_builds_hierarchy() -> TestResult {
    let _guard = DB_GUARD.lock().await;
    let Some(db) = setup_database().await? else {
        return Ok(());
    };

    let repo = node_repo();
    let leaf = repo
        .find_or_create_by_path(&db, &["root", "child", "leaf"])
        .await?;
    assert_eq!(leaf.name, "leaf");
    assert_eq!(leaf.level, 2);

    let child = repo
        .find_by_path(&db, &["root", "child"])
        .await?
        .expect("child node exists");
    let descendants = repo.descendants(&db, &child).await?;
    let names: Vec<String> = descendants.into_iter().map(|node| node.name).collect();
    assert_eq!(names, vec!["leaf"]);

    // Re-running the same path creates nothing new.
    let again = repo
        .find_or_create_by_path(&db, &["root", "child", "leaf"])
        .await?;
    assert_eq!(again.id, leaf.id);

    Ok(())
}

async fn edge_pairs(db: &DatabaseConnection) -> Result<Vec<(i32, i32)>, DbErr> {
    let mut pairs: Vec<(i32, i32)> = entity::node_edge::Entity::find()
        .all(db)
        .await?
        .into_iter()
        .map(|edge| (edge.descendant_id, edge.ancestor_id))
        .collect();
    pairs.sort_unstable();
    Ok(pairs)
}

async fn levels_by_name(db: &DatabaseConnection) -> Result<Vec<(String, i32)>, DbErr> {
    let mut levels: Vec<(String, i32)> = entity::node::Entity::find()
        .all(db)
        .await?
        .into_iter()
        .map(|node| (node.name, node.level))
        .collect();
    levels.sort();
    Ok(levels)
}

/// Connect, bootstrap the schema and truncate. Returns `None` (skipping the
/// test) when no database URL is configured.
async fn setup_database() -> Result<Option<DatabaseConnection>, sea_orm::DbErr> {
    let url = match std::env::var("SEA_HIERARCHY_TEST_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
    {
        Ok(url) => url,
        Err(_) => {
            eprintln!(
                "skipping: set SEA_HIERARCHY_TEST_DATABASE_URL or DATABASE_URL to run this test"
            );
            return Ok(None);
        }
    };

    let db = Database::connect(url).await?;

    for ddl in [
        r#"
        CREATE TABLE IF NOT EXISTS nodes (
            id SERIAL PRIMARY KEY,
            parent_id INTEGER REFERENCES nodes(id) ON DELETE CASCADE,
            level INTEGER NOT NULL DEFAULT 0,
            name TEXT NOT NULL
        );
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS node_edges (
            descendant_id INTEGER NOT NULL REFERENCES nodes(id) ON DELETE CASCADE,
            ancestor_id INTEGER NOT NULL REFERENCES nodes(id) ON DELETE CASCADE,
            PRIMARY KEY (descendant_id, ancestor_id)
        );
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS folders (
            id SERIAL PRIMARY KEY,
            parent_id INTEGER REFERENCES folders(id) ON DELETE CASCADE,
            level INTEGER NOT NULL DEFAULT 0,
            name TEXT NOT NULL
        );
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS folder_edges (
            descendant_id INTEGER NOT NULL REFERENCES folders(id) ON DELETE CASCADE,
            ancestor_id INTEGER NOT NULL REFERENCES folders(id) ON DELETE CASCADE,
            PRIMARY KEY (descendant_id, ancestor_id)
        );
        "#,
        "TRUNCATE TABLE node_edges, nodes RESTART IDENTITY CASCADE;",
        "TRUNCATE TABLE folder_edges, folders RESTART IDENTITY CASCADE;",
    ] {
        db.execute(Statement::from_string(DbBackend::Postgres, ddl))
            .await?;
    }

    Ok(Some(db))
}
