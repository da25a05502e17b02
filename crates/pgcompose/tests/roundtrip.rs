use pgcompose::{
    ComposeResult, Execer, Fragment, VirtualTable, expr, insert_into, params, select, select_doc,
};
use tokio_postgres::NoTls;

async fn connect() -> Option<tokio_postgres::Client> {
    dotenvy::dotenv().ok();
    let database_url = match std::env::var("DATABASE_URL") {
        Ok(v) => v,
        Err(_) => {
            eprintln!("DATABASE_URL is not set; skipping database round-trip");
            return None;
        }
    };
    let (client, connection) = tokio_postgres::connect(&database_url, NoTls)
        .await
        .expect("connect to DATABASE_URL");
    tokio::spawn(async move {
        let _ = connection.await;
    });
    Some(client)
}

#[tokio::test]
async fn upsert_and_document_roundtrip() -> ComposeResult<()> {
    let Some(mut client) = connect().await else {
        return Ok(());
    };
    let tx = client.transaction().await?;

    tx.batch_execute(
        "CREATE TEMP TABLE people (id bigint PRIMARY KEY, name text NOT NULL) ON COMMIT DROP;
         CREATE TEMP TABLE posts (id bigserial PRIMARY KEY, person_id bigint NOT NULL, title text NOT NULL) ON COMMIT DROP;",
    )
    .await?;

    let inserted = tx
        .exec(
            &insert_into("people")
                .columns(["id", "name"])
                .values(params![1_i64, "ann"])
                .values(params![2_i64, "bob"])
                .to_sql()?,
        )
        .await?;
    assert_eq!(inserted, 2);

    let upsert = insert_into("people")
        .columns(["id", "name"])
        .values(params![1_i64, "anna"])
        .on_conflict_column("id")
        .set_excluded("name")
        .returning(["name"])
        .to_sql()?;
    let rows = tx.fetch(&upsert).await?;
    assert_eq!(rows[0].get::<_, String>(0), "anna");

    tx.exec(
        &insert_into("posts")
            .columns(["person_id", "title"])
            .values(params![1_i64, "first"])
            .values(params![1_i64, "second"])
            .to_sql()?,
    )
    .await?;

    let posts = select(["title"])
        .from("posts")
        .where_("posts.person_id = people.id")
        .order_by("id");
    let doc = select_doc(["id", "name"])
        .many("posts", posts)
        .from("people")
        .where_(expr!("id = $1", 1_i64))
        .to_sql()?;
    let docs = tx.fetch_json(&doc).await?;

    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0]["name"], "anna");
    assert_eq!(docs[0]["posts"][1]["title"], "second");

    let table = VirtualTable::nullable_scalars(&[Some(3_i64), None, Some(5)]).to_sql()?;
    let q = select(["count(data)"])
        .from(Fragment::with_params(format!("({}) AS v", table.sql), table.params))
        .to_sql()?;
    let rows = tx.fetch(&q).await?;
    assert_eq!(rows[0].get::<_, i64>(0), 2);

    tx.rollback().await?;
    Ok(())
}
