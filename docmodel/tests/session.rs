use std::sync::Arc;

use docmodel::{
    bson::{doc, oid::ObjectId},
    memory::InMemoryStore,
    prelude::*,
};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn person(registry: &Registry) -> Arc<DocumentSchema> {
    DocumentSchema::builder("Person")
        .collection("people")
        .field("name", StringField::new().max_length(32))
        .field("age", Field::new(IntField::new().min(0)).optional())
        .field("tags", Field::new(ListField::new(StringField::new())).default(Value::list(Vec::<Value>::new())))
        .index(Index::new().ascending("name").unique())
        .default_sort("age", SortDirection::Asc)
        .build_in(registry)
        .unwrap()
}

fn setup() -> (Session<InMemoryStore>, Arc<DocumentSchema>) {
    init_logging();

    let registry = Arc::new(Registry::new());
    let schema = person(&registry);

    (Session::with_registry(InMemoryStore::new(), registry), schema)
}

fn someone(schema: &Arc<DocumentSchema>, name: &str, age: i32) -> Document {
    Document::new(schema, [("name", Value::from(name)), ("age", Value::from(age))]).unwrap()
}

async fn seed(session: &Session<InMemoryStore>, schema: &Arc<DocumentSchema>) {
    for (name, age) in [("Ada", 36), ("Grace", 45), ("Alan", 41), ("Edsger", 72)] {
        session.insert(&mut someone(schema, name, age)).await.unwrap();
    }
}

#[tokio::test]
async fn test_insert_assigns_id_and_stores_defaults() {
    let (session, schema) = setup();
    let mut ada = someone(&schema, "Ada", 36);

    assert!(!ada.has_id());
    session.insert(&mut ada).await.unwrap();

    assert!(ada.has_id());
    assert!(!ada.is_dirty());

    let stored = session
        .backend()
        .find_documents("people", &FindSpec::filter(doc! { "name": "Ada" }))
        .await
        .unwrap();

    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].get_array("tags").unwrap().len(), 0);
    assert_eq!(stored[0].get_object_id("_id").ok(), ada.id().unwrap().as_object_id());
}

#[tokio::test]
async fn test_query_one_first_and_count() {
    let (session, schema) = setup();
    seed(&session, &schema).await;

    let query = Query::new(&schema).filter_by("name", "Grace").unwrap();
    let mut grace = session.one(&query).await.unwrap();
    assert_eq!(grace.get("age").unwrap(), &Value::from(45));

    let older = Query::new(&schema)
        .filter(schema.query_field("age").unwrap().gt(40).unwrap())
        .unwrap();
    assert_eq!(session.count(&older).await.unwrap(), 3);
    assert!(matches!(session.one(&older).await, Err(MapperError::BadResult(_))));

    let nobody = Query::new(&schema).filter_by("name", "Nobody").unwrap();
    assert!(matches!(session.one(&nobody).await, Err(MapperError::BadResult(_))));
    assert!(session.first(&nobody).await.unwrap().is_none());
}

#[tokio::test]
async fn test_sorting_and_paging() {
    let (session, schema) = setup();
    seed(&session, &schema).await;

    let names = |documents: Vec<Document>| {
        documents
            .into_iter()
            .map(|mut document| document.get("name").unwrap().as_str().unwrap().to_string())
            .collect::<Vec<_>>()
    };

    let by_default = session.all(&Query::new(&schema)).await.unwrap();
    assert_eq!(names(by_default), ["Ada", "Alan", "Grace", "Edsger"]);

    let page = Query::new(&schema)
        .descending("age")
        .unwrap()
        .skip(1)
        .limit(2);
    assert_eq!(names(session.all(&page).await.unwrap()), ["Grace", "Alan"]);
}

#[tokio::test]
async fn test_update_sends_only_changes() {
    let (session, schema) = setup();
    let mut ada = someone(&schema, "Ada", 36);
    session.insert(&mut ada).await.unwrap();

    let untouched = session.update(&mut ada, false).await.unwrap();
    assert_eq!(untouched, UpdateAck::default());

    ada.set("age", 37).unwrap();
    assert_eq!(ada.dirty_ops(false).unwrap(), doc! { "$set": { "age": 37 } });

    let ack = session.update(&mut ada, false).await.unwrap();
    assert_eq!((ack.matched, ack.modified), (1, 1));
    assert!(!ada.is_dirty());

    let mut reloaded = session
        .one(&Query::new(&schema).filter_by("name", "Ada").unwrap())
        .await
        .unwrap();
    assert_eq!(reloaded.get("age").unwrap(), &Value::from(37));
}

#[tokio::test]
async fn test_partial_load() {
    let (session, schema) = setup();
    seed(&session, &schema).await;

    let query = Query::new(&schema)
        .filter_by("name", "Alan")
        .unwrap()
        .fields(["name"])
        .unwrap();
    let mut alan = session.one(&query).await.unwrap();

    assert!(alan.is_partial());
    assert_eq!(alan.get("name").unwrap(), &Value::from("Alan"));
    assert!(matches!(alan.get("age"), Err(MapperError::FieldNotRetrieved(_))));

    alan.set("name", "Alan T").unwrap();
    session.update(&mut alan, false).await.unwrap();

    let mut full = session
        .one(&Query::new(&schema).filter_by("name", "Alan T").unwrap())
        .await
        .unwrap();
    assert_eq!(full.get("age").unwrap(), &Value::from(41));
}

#[tokio::test]
async fn test_update_expressions() {
    let (session, schema) = setup();
    seed(&session, &schema).await;

    let birthday = Query::new(&schema)
        .filter(schema.query_field("age").unwrap().lt(50).unwrap())
        .unwrap()
        .update()
        .inc("age", 1)
        .unwrap()
        .append("tags", "older")
        .unwrap()
        .multi();

    let ack = birthday.execute(&session).await.unwrap();
    assert_eq!(ack.modified, 3);

    let tagged = Query::new(&schema).filter_by("tags", "older").unwrap();
    assert_eq!(session.count(&tagged).await.unwrap(), 3);

    let upsert = Query::new(&schema)
        .filter_by("name", "Barbara")
        .unwrap()
        .update()
        .set("age", 80)
        .unwrap()
        .upsert();
    let ack = session.execute_update(&upsert).await.unwrap();
    assert!(ack.upserted_id.is_some());

    let mut barbara = session
        .one(&Query::new(&schema).filter_by("name", "Barbara").unwrap())
        .await
        .unwrap();
    assert_eq!(barbara.get("age").unwrap(), &Value::from(80));

    let illegal = Query::new(&schema).update().inc("name", 1);
    assert!(matches!(illegal, Err(MapperError::InvalidModifier { .. })));
}

#[tokio::test]
async fn test_remove_and_clear_collection() {
    let (session, schema) = setup();
    seed(&session, &schema).await;

    let mut ada = session
        .one(&Query::new(&schema).filter_by("name", "Ada").unwrap())
        .await
        .unwrap();
    assert!(session.remove(&ada).await.unwrap());
    assert!(!session.remove(&Document::empty(&schema)).await.unwrap());
    assert!(ada.get("name").is_ok());

    let old = Query::new(&schema)
        .filter(schema.query_field("age").unwrap().gte(45).unwrap())
        .unwrap();
    assert_eq!(session.execute_remove(&old).await.unwrap(), 2);
    assert_eq!(session.count(&Query::new(&schema)).await.unwrap(), 1);

    session.clear_collection(&schema).await.unwrap();
    assert_eq!(session.count(&Query::new(&schema)).await.unwrap(), 0);
}

#[tokio::test]
async fn test_unique_index_is_ensured() {
    let (session, schema) = setup();

    session.insert(&mut someone(&schema, "Ada", 36)).await.unwrap();
    let duplicate = session.insert(&mut someone(&schema, "Ada", 12)).await;

    assert!(matches!(duplicate, Err(MapperError::Backend(_))));
    assert_eq!(session.backend().indexes("people").await.len(), 1);
}

#[tokio::test]
async fn test_queued_operations_flush_in_order() {
    let (session, schema) = setup();
    let mut ada = someone(&schema, "Ada", 36);
    let mut grace = someone(&schema, "Grace", 45);
    session.insert(&mut ada).await.unwrap();
    session.insert(&mut grace).await.unwrap();

    ada.set("age", 40).unwrap();
    session.enqueue_update(&mut ada, false).unwrap();
    session.enqueue_remove(&grace).unwrap();
    assert_eq!(session.pending(), 2);

    let stored = session
        .backend()
        .count_documents("people", &doc! {})
        .await
        .unwrap();
    assert_eq!(stored, 2);

    let everyone = session.all(&Query::new(&schema)).await.unwrap();
    assert_eq!(session.pending(), 0);
    assert_eq!(everyone.len(), 1);
    assert_eq!(everyone[0].peek("age"), Some(&Value::from(40)));

    ada.set("age", 50).unwrap();
    session.enqueue_update(&mut ada, false).unwrap();
    session.clear();
    assert_eq!(session.pending(), 0);

    session.end().await.unwrap();
}

#[tokio::test]
async fn test_references_resolve_explicitly() {
    init_logging();

    let registry = Arc::new(Registry::new());
    let author = DocumentSchema::builder("Author")
        .collection("authors")
        .field("name", StringField::new())
        .build_in(&registry)
        .unwrap();
    let book = DocumentSchema::builder("Book")
        .collection("books")
        .field("title", StringField::new())
        .field("author", SRefField::new(DocumentField::new(&author)))
        .field("editor", Field::new(RefField::to(DocumentField::new(&author))).optional())
        .field("reviewers", ListField::new(SRefField::new(DocumentField::new(&author))))
        .build_in(&registry)
        .unwrap();

    let session = Session::with_registry(InMemoryStore::new(), Arc::clone(&registry));

    let mut ada = Document::new(&author, [("name", "Ada")]).unwrap();
    let mut charles = Document::new(&author, [("name", "Charles")]).unwrap();
    session.insert(&mut ada).await.unwrap();
    session.insert(&mut charles).await.unwrap();

    let mut notes = Document::new(
        &book,
        [
            ("title", Value::from("Notes")),
            ("author", ada.id().unwrap().clone()),
            ("editor", Value::from(charles.to_ref().unwrap())),
            (
                "reviewers",
                Value::list([charles.id().unwrap().clone(), Value::from(ObjectId::new())]),
            ),
        ],
    )
    .unwrap();
    session.insert(&mut notes).await.unwrap();

    let mut written_by = session.resolve(&notes, "author").await.unwrap().unwrap();
    assert_eq!(written_by.get("name").unwrap(), &Value::from("Ada"));

    let mut edited_by = session.resolve(&notes, "editor").await.unwrap().unwrap();
    assert_eq!(edited_by.get("name").unwrap(), &Value::from("Charles"));

    let reviewers = session.resolve_all(&notes, "reviewers").await.unwrap();
    assert_eq!(reviewers.len(), 1);

    let by_ref = session.dereference(&ada.to_ref().unwrap()).await.unwrap();
    assert_eq!(by_ref, Some(ada));

    assert!(matches!(
        session.resolve(&notes, "title").await,
        Err(MapperError::BadFieldSpecification(_))
    ));
}

#[tokio::test]
async fn test_subclass_records_load_as_their_subclass() {
    init_logging();

    let registry = Arc::new(Registry::new());
    let animal = DocumentSchema::builder("Animal")
        .collection("animals")
        .polymorphic_on("kind")
        .polymorphic_collection()
        .field("kind", Field::new(StringField::new()).optional())
        .field("name", StringField::new())
        .build_in(&registry)
        .unwrap();
    let dog = DocumentSchema::builder("Dog")
        .extends(&animal)
        .polymorphic_identity("dog")
        .field("tricks", IntField::new())
        .build_in(&registry)
        .unwrap();
    let cat = DocumentSchema::builder("Cat")
        .extends(&animal)
        .polymorphic_identity("cat")
        .field("lives", IntField::new())
        .build_in(&registry)
        .unwrap();

    let session = Session::with_registry(InMemoryStore::new(), Arc::clone(&registry));

    let mut generic = Document::new(&animal, [("name", "Generic")]).unwrap();
    let mut rex = Document::new(&dog, [("name", Value::from("Rex")), ("tricks", Value::from(3))]).unwrap();
    let mut tom = Document::new(&cat, [("name", Value::from("Tom")), ("lives", Value::from(9))]).unwrap();
    assert_eq!(rex.peek("kind"), Some(&Value::from("dog")));

    for document in [&mut generic, &mut rex, &mut tom] {
        session.insert(document).await.unwrap();
    }

    let everyone = session
        .all(&Query::new(&animal).ascending("name").unwrap())
        .await
        .unwrap();
    let schemas: Vec<&str> = everyone.iter().map(|document| document.schema().name()).collect();
    assert_eq!(schemas, ["Animal", "Dog", "Cat"]);

    let mut loaded = session.one(&Query::new(&dog)).await.unwrap();
    assert_eq!(loaded.get("tricks").unwrap(), &Value::from(3));
    assert_eq!(loaded.get("kind").unwrap(), &Value::from("dog"));

    assert_eq!(session.count(&Query::new(&cat)).await.unwrap(), 1);
    assert_eq!(session.count(&Query::excluding_subclasses(&animal)).await.unwrap(), 1);
}

#[tokio::test]
async fn test_find_and_modify_returns_one_document() {
    let (session, schema) = setup();
    seed(&session, &schema).await;

    let oldest = Query::new(&schema)
        .filter(schema.query_field("age").unwrap().gt(40).unwrap())
        .unwrap()
        .descending("age")
        .unwrap();

    let before = oldest.update().inc("age", 1).unwrap().find_and_modify(false);
    let mut edsger = session.execute_find_and_modify(&before).await.unwrap().unwrap();
    assert_eq!(edsger.get("name").unwrap(), &Value::from("Edsger"));
    assert_eq!(edsger.get("age").unwrap(), &Value::from(72));

    let after = oldest.update().inc("age", 1).unwrap().find_and_modify(true);
    let mut edsger = after.execute(&session).await.unwrap().unwrap();
    assert_eq!(edsger.get("age").unwrap(), &Value::from(74));

    let upsert = Query::new(&schema)
        .filter_by("name", "Barbara")
        .unwrap()
        .update()
        .set("age", 80)
        .unwrap()
        .upsert()
        .find_and_modify(true);
    let mut barbara = session.execute_find_and_modify(&upsert).await.unwrap().unwrap();
    assert!(barbara.has_id());
    assert_eq!(barbara.get("name").unwrap(), &Value::from("Barbara"));

    let removal = Query::new(&schema).filter_by("name", "Ada").unwrap().find_and_remove();
    let mut ada = session.execute_find_and_modify(&removal).await.unwrap().unwrap();
    assert_eq!(ada.get("age").unwrap(), &Value::from(36));
    assert!(session.execute_find_and_modify(&removal).await.unwrap().is_none());

    let empty = Query::new(&schema).update().find_and_modify(true);
    assert!(matches!(
        session.execute_find_and_modify(&empty).await,
        Err(MapperError::BadQuery(_))
    ));
}

#[tokio::test]
async fn test_distinct_values() {
    let (session, schema) = setup();
    seed(&session, &schema).await;

    Query::new(&schema)
        .filter(schema.query_field("age").unwrap().gte(45).unwrap())
        .unwrap()
        .update()
        .append("tags", "senior")
        .unwrap()
        .multi()
        .execute(&session)
        .await
        .unwrap();
    Query::new(&schema)
        .filter_by("name", "Ada")
        .unwrap()
        .update()
        .append("tags", "pioneer")
        .unwrap()
        .execute(&session)
        .await
        .unwrap();

    let tags = session.distinct(&Query::new(&schema), "tags").await.unwrap();
    assert_eq!(tags, vec![Value::from("pioneer"), Value::from("senior")]);

    let older = Query::new(&schema)
        .filter(schema.query_field("age").unwrap().gt(40).unwrap())
        .unwrap();
    assert_eq!(session.distinct(&older, "age").await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_excluded_fields_are_not_retrieved() {
    let (session, schema) = setup();
    seed(&session, &schema).await;

    let query = Query::new(&schema)
        .filter_by("name", "Grace")
        .unwrap()
        .exclude(["age"])
        .unwrap();
    let mut grace = session.one(&query).await.unwrap();

    assert!(grace.is_partial());
    assert_eq!(grace.get("name").unwrap(), &Value::from("Grace"));
    assert!(matches!(grace.get("age"), Err(MapperError::FieldNotRetrieved(_))));

    let mixed = Query::new(&schema).fields(["name"]).unwrap().exclude(["age"]);
    assert!(matches!(mixed, Err(MapperError::BadQuery(_))));
}

#[tokio::test]
async fn test_elem_match_projection() {
    let (session, schema) = setup();
    let mut ada = Document::new(
        &schema,
        [
            ("name", Value::from("Ada")),
            ("tags", Value::list(["math", "poetry", "engines"])),
        ],
    )
    .unwrap();
    session.insert(&mut ada).await.unwrap();

    let query = Query::new(&schema)
        .filter_by("name", "Ada")
        .unwrap()
        .fields_elem_match("tags", QueryExpression::raw(doc! { "$gte": "p" }))
        .unwrap();
    let mut loaded = session.one(&query).await.unwrap();

    assert_eq!(loaded.get("tags").unwrap(), &Value::list(["poetry"]));
    assert!(matches!(loaded.get("name"), Err(MapperError::FieldNotRetrieved(_))));
}

#[tokio::test]
async fn test_update_with_selector_and_operator_override() {
    let (session, schema) = setup();
    seed(&session, &schema).await;

    let mut ada = session
        .one(&Query::new(&schema).filter_by("name", "Ada").unwrap())
        .await
        .unwrap();
    ada.set("age", 5).unwrap();
    session
        .update_with(&mut ada, &UpdateOptions::new().op("age", UpdateOp::Inc))
        .await
        .unwrap();

    let mut copy = someone(&schema, "Grace", 46);
    let selector = schema.query_field("name").unwrap().eq("Grace").unwrap();
    let ack = session
        .update_with(&mut copy, &UpdateOptions::new().matching(selector))
        .await
        .unwrap();
    assert_eq!(ack.matched, 1);

    let ages = session
        .all(&Query::new(&schema).in_("name", ["Ada", "Grace"]).unwrap())
        .await
        .unwrap()
        .into_iter()
        .map(|mut document| document.get("age").unwrap().clone())
        .collect::<Vec<_>>();
    assert_eq!(ages, [Value::from(41), Value::from(46)]);
}

#[tokio::test]
async fn test_empty_update_leaves_queue_untouched() {
    let (session, schema) = setup();
    let mut ada = someone(&schema, "Ada", 36);
    session.insert(&mut ada).await.unwrap();

    ada.set("age", 40).unwrap();
    session.enqueue_update(&mut ada, false).unwrap();

    let empty = Query::new(&schema).update();
    assert!(matches!(session.execute_update(&empty).await, Err(MapperError::BadQuery(_))));
    assert_eq!(session.pending(), 1);
}

#[tokio::test]
async fn test_removals_ensure_indexes() {
    let (session, schema) = setup();
    let ghost = Document::new(&schema, [("mongo_id", Value::from(ObjectId::new())), ("name", Value::from("Ghost"))]).unwrap();

    assert!(!session.remove(&ghost).await.unwrap());
    assert_eq!(session.backend().indexes("people").await.len(), 1);

    let (session, schema) = setup();
    let ghost = Document::new(&schema, [("mongo_id", Value::from(ObjectId::new())), ("name", Value::from("Ghost"))]).unwrap();

    session.enqueue_remove(&ghost).unwrap();
    session.flush().await.unwrap();
    assert_eq!(session.backend().indexes("people").await.len(), 1);
}
