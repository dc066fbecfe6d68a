use ccq_core::db::migrations::latest_version;
use ccq_core::db::{open_db, open_db_in_memory};
use ccq_core::{
    Book, BookRepository, BookValidationError, RepoError, Section, SqliteBookRepository,
    StoreCounts,
};
use rusqlite::{params, Connection};
use std::collections::{HashMap, HashSet};

fn section(urn: &str, title: &str, paragraphs: &[&str]) -> Section {
    Section::new(
        urn,
        title,
        paragraphs.iter().map(|p| p.to_string()).collect(),
    )
}

fn analects() -> Book {
    Book::new(
        "論語",
        vec![
            section(
                "ctp:analects/xue-er",
                "學而",
                &["學而時習之，不亦說乎？", "巧言令色，鮮矣仁！"],
            ),
            section("ctp:analects/wei-zheng", "為政", &["為政以德。"]),
            section("ctp:analects/ba-yi", "八佾", &[]),
        ],
    )
}

fn dao_de_jing() -> Book {
    Book::new(
        "道德經",
        vec![section(
            "ctp:dao-de-jing",
            "道德經",
            &["道可道，非常道。", "上善若水。"],
        )],
    )
}

fn install_paragraph_failure(conn: &Connection, content: &str) {
    conn.execute_batch(&format!(
        "CREATE TRIGGER fail_paragraph_insert
         BEFORE INSERT ON paragraph
         WHEN NEW.content = '{content}'
         BEGIN
             SELECT RAISE(ABORT, 'forced paragraph failure');
         END;"
    ))
    .unwrap();
}

#[test]
fn save_round_trips_rows_and_links() {
    let mut conn = open_db_in_memory().unwrap();
    let book = analects();
    let saved = {
        let mut repo = SqliteBookRepository::try_new(&mut conn).unwrap();
        repo.save(&book).unwrap()
    };

    let book_id = saved.id.unwrap();
    let mut stmt = conn
        .prepare("SELECT id, urn, title FROM section WHERE book_id = ?1 ORDER BY id;")
        .unwrap();
    let sections: Vec<(i64, String, String)> = stmt
        .query_map([book_id], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(sections.len(), book.sections.len());
    for ((id, urn, title), original) in sections.iter().zip(&book.sections) {
        assert_eq!(urn, &original.urn);
        assert_eq!(title, &original.title);

        let mut stmt = conn
            .prepare("SELECT content FROM paragraph WHERE section_id = ?1 ORDER BY id;")
            .unwrap();
        let contents: Vec<String> = stmt
            .query_map([id], |row| row.get(0))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(contents, original.paragraphs);
    }

    let paragraphs: i64 = conn
        .query_row("SELECT COUNT(*) FROM paragraph;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(paragraphs, 3);
}

#[test]
fn save_returns_identified_copy_and_leaves_input_untouched() {
    let mut conn = open_db_in_memory().unwrap();
    let mut repo = SqliteBookRepository::try_new(&mut conn).unwrap();
    let book = analects();

    let saved = repo.save(&book).unwrap();

    assert!(book.id.is_none());
    assert!(book.sections.iter().all(|s| s.id.is_none()));
    assert!(saved.is_persisted());
    assert_eq!(saved.title, book.title);
    let ids: HashSet<_> = saved.sections.iter().map(|s| s.id.unwrap()).collect();
    assert_eq!(ids.len(), saved.sections.len());
}

#[test]
fn section_ids_follow_submission_order_even_with_repeated_titles() {
    let mut conn = open_db_in_memory().unwrap();
    let book = Book::new(
        "重複",
        vec![
            section("ctp:dup/1", "同名", &["first"]),
            section("ctp:dup/1", "同名", &["second", "third"]),
            section("ctp:dup/2", "同名", &["fourth"]),
        ],
    );
    let saved = {
        let mut repo = SqliteBookRepository::try_new(&mut conn).unwrap();
        repo.save(&book).unwrap()
    };

    for saved_section in &saved.sections {
        let mut stmt = conn
            .prepare("SELECT content FROM paragraph WHERE section_id = ?1 ORDER BY id;")
            .unwrap();
        let contents: Vec<String> = stmt
            .query_map([saved_section.id.unwrap()], |row| row.get(0))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(contents, saved_section.paragraphs);
    }
}

#[test]
fn failed_paragraph_insert_rolls_back_whole_book() {
    let mut conn = open_db_in_memory().unwrap();
    install_paragraph_failure(&conn, "boom");

    let mut book = analects();
    book.sections
        .last_mut()
        .unwrap()
        .paragraphs
        .push("boom".to_string());

    let mut repo = SqliteBookRepository::try_new(&mut conn).unwrap();
    let err = repo.save(&book).unwrap_err();
    match &err {
        RepoError::SaveFailed { book_title, .. } => assert_eq!(book_title, "論語"),
        other => panic!("unexpected error: {other}"),
    }
    assert!(err.is_constraint_violation());
    assert!(err.to_string().contains("論語"));

    assert_eq!(repo.counts().unwrap(), StoreCounts::default());
}

#[test]
fn failed_save_keeps_previously_saved_books() {
    let mut conn = open_db_in_memory().unwrap();
    install_paragraph_failure(&conn, "boom");
    let mut repo = SqliteBookRepository::try_new(&mut conn).unwrap();

    repo.save(&dao_de_jing()).unwrap();
    let broken = Book::new("壞書", vec![section("ctp:bad", "bad", &["ok", "boom"])]);
    assert!(repo.save(&broken).is_err());

    let counts = repo.counts().unwrap();
    assert_eq!(counts.books, 1);
    assert_eq!(counts.sections, 1);
    assert_eq!(counts.paragraphs, 2);
}

#[test]
fn blank_title_is_rejected_before_sql() {
    let mut conn = open_db_in_memory().unwrap();
    let mut repo = SqliteBookRepository::try_new(&mut conn).unwrap();

    let err = repo.save(&Book::new("   ", Vec::new())).unwrap_err();
    assert!(matches!(
        err,
        RepoError::Validation(BookValidationError::BlankTitle)
    ));
    assert_eq!(repo.counts().unwrap().books, 0);
}

#[test]
fn replace_all_leaves_exactly_new_books() {
    let mut conn = open_db_in_memory().unwrap();
    {
        let mut repo = SqliteBookRepository::try_new(&mut conn).unwrap();
        repo.save(&Book::new("舊書", vec![section("ctp:old", "舊", &["old text"])]))
            .unwrap();

        let saved = repo.replace_all(&[analects(), dao_de_jing()]).unwrap();
        assert_eq!(saved.len(), 2);
        assert!(saved.iter().all(Book::is_persisted));
    }

    let mut stmt = conn.prepare("SELECT title FROM book ORDER BY id;").unwrap();
    let titles: Vec<String> = stmt
        .query_map([], |row| row.get(0))
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(titles, ["論語", "道德經"]);

    let old_paragraphs: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM paragraph WHERE content = 'old text';",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(old_paragraphs, 0);
}

#[test]
fn replace_all_stops_at_first_failing_book() {
    let mut conn = open_db_in_memory().unwrap();
    install_paragraph_failure(&conn, "boom");
    let mut repo = SqliteBookRepository::try_new(&mut conn).unwrap();
    repo.save(&Book::new("舊書", vec![section("ctp:old", "舊", &["old"])]))
        .unwrap();

    let broken = Book::new("壞書", vec![section("ctp:bad", "bad", &["boom"])]);
    let err = repo
        .replace_all(&[dao_de_jing(), broken, analects()])
        .unwrap_err();
    assert!(matches!(err, RepoError::SaveFailed { ref book_title, .. } if book_title == "壞書"));

    // The previous content is gone and only the books before the failure remain.
    let counts = repo.counts().unwrap();
    assert_eq!(counts.books, 1);
    assert!(repo
        .find_random_paragraph_in_book("道德經", u32::MAX)
        .unwrap()
        .is_some());
    assert!(repo
        .find_random_paragraph_in_book("舊書", u32::MAX)
        .unwrap()
        .is_none());
    assert!(repo
        .find_random_paragraph_in_book("論語", u32::MAX)
        .unwrap()
        .is_none());
}

#[test]
fn delete_all_is_idempotent() {
    let mut conn = open_db_in_memory().unwrap();
    let mut repo = SqliteBookRepository::try_new(&mut conn).unwrap();

    assert_eq!(repo.delete_all().unwrap(), 0);
    repo.save(&analects()).unwrap();
    repo.save(&dao_de_jing()).unwrap();
    assert_eq!(repo.delete_all().unwrap(), 2);
    assert_eq!(repo.delete_all().unwrap(), 0);
    assert_eq!(repo.counts().unwrap(), StoreCounts::default());
}

#[test]
fn length_filter_never_exceeds_bound() {
    let mut conn = open_db_in_memory().unwrap();
    let mut repo = SqliteBookRepository::try_new(&mut conn).unwrap();
    repo.save(&Book::new(
        "長短",
        vec![section(
            "ctp:mixed",
            "長短",
            &["短句", "十個字十個字十個字十", "這一句明顯超過了十個字的長度限制"],
        )],
    ))
    .unwrap();

    for _ in 0..200 {
        let quote = repo.find_random_paragraph(10).unwrap().unwrap();
        assert!(quote.text.chars().count() <= 10, "too long: {}", quote.text);
    }
    assert!(repo.find_random_paragraph(1).unwrap().is_none());
}

#[test]
fn paragraph_with_nul_is_rejected_before_sql() {
    let mut conn = open_db_in_memory().unwrap();
    let mut repo = SqliteBookRepository::try_new(&mut conn).unwrap();
    let long_text = format!("ab\0{}", "字".repeat(50));
    let book = Book::new("長短", vec![section("ctp:nul", "長短", &[long_text.as_str()])]);

    let err = repo.save(&book).unwrap_err();
    assert!(matches!(
        err,
        RepoError::Validation(BookValidationError::NulInParagraph {
            section: 0,
            paragraph: 0
        })
    ));
    assert!(repo.find_random_paragraph(10).unwrap().is_none());
    assert_eq!(repo.counts().unwrap(), StoreCounts::default());
}

#[test]
fn replace_all_validates_every_book_before_deleting() {
    let mut conn = open_db_in_memory().unwrap();
    let mut repo = SqliteBookRepository::try_new(&mut conn).unwrap();
    repo.save(&dao_de_jing()).unwrap();

    let invalid = Book::new("壞書", vec![section("ctp:bad", "bad", &["a\0b"])]);
    let err = repo.replace_all(&[analects(), invalid]).unwrap_err();
    assert!(matches!(err, RepoError::Validation(_)));

    let counts = repo.counts().unwrap();
    assert_eq!(counts.books, 1);
    assert!(repo
        .find_random_paragraph_in_book("道德經", u32::MAX)
        .unwrap()
        .is_some());
}

#[test]
fn empty_store_returns_none() {
    let mut conn = open_db_in_memory().unwrap();
    let repo = SqliteBookRepository::try_new(&mut conn).unwrap();

    assert!(repo.find_random_paragraph(u32::MAX).unwrap().is_none());
    assert!(repo
        .find_random_paragraph_in_book("論語", u32::MAX)
        .unwrap()
        .is_none());
}

#[test]
fn title_filter_only_returns_that_book() {
    let mut conn = open_db_in_memory().unwrap();
    let mut repo = SqliteBookRepository::try_new(&mut conn).unwrap();
    repo.replace_all(&[analects(), dao_de_jing()]).unwrap();

    let dao_paragraphs: HashSet<&str> = ["道可道，非常道。", "上善若水。"].into_iter().collect();
    for _ in 0..100 {
        let found = repo
            .find_random_paragraph_in_book("道德經", 1000)
            .unwrap()
            .unwrap();
        assert_eq!(found.section_title, "道德經");
        assert!(dao_paragraphs.contains(found.text.as_str()));
    }

    assert!(repo
        .find_random_paragraph_in_book("Tao Te Ching", 1000)
        .unwrap()
        .is_none());
    assert!(repo
        .find_random_paragraph_in_book("道德", 1000)
        .unwrap()
        .is_none());
}

#[test]
fn unconstrained_lookup_returns_book_and_section_titles() {
    let mut conn = open_db_in_memory().unwrap();
    let mut repo = SqliteBookRepository::try_new(&mut conn).unwrap();
    repo.save(&Book::new(
        "論語",
        vec![section("ctp:analects/wei-zheng", "為政", &["為政以德。"])],
    ))
    .unwrap();

    let quote = repo.find_random_paragraph(u32::MAX).unwrap().unwrap();
    assert_eq!(quote.book_title, "論語");
    assert_eq!(quote.section_title, "為政");
    assert_eq!(quote.text, "為政以德。");
}

#[test]
fn random_selection_is_roughly_uniform() {
    let mut conn = open_db_in_memory().unwrap();
    let mut repo = SqliteBookRepository::try_new(&mut conn).unwrap();
    repo.replace_all(&[
        Book::new("甲", vec![section("ctp:a", "甲", &["一", "二"])]),
        Book::new("乙", vec![section("ctp:b", "乙", &["三", "四"])]),
    ])
    .unwrap();

    const DRAWS: usize = 4000;
    let mut frequencies: HashMap<String, usize> = HashMap::new();
    for _ in 0..DRAWS {
        let quote = repo.find_random_paragraph(u32::MAX).unwrap().unwrap();
        *frequencies.entry(quote.text).or_default() += 1;
    }

    assert_eq!(frequencies.len(), 4);
    for (text, count) in &frequencies {
        // Expected 1000 per paragraph; the bounds sit beyond 7 standard deviations.
        assert!((800..=1200).contains(count), "{text} drawn {count} times");
    }
}

#[test]
fn repository_rejects_uninitialized_connection() {
    let mut conn = Connection::open_in_memory().unwrap();

    match SqliteBookRepository::try_new(&mut conn) {
        Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version: 0,
        }) => assert_eq!(expected_version, latest_version()),
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("expected uninitialized connection error"),
    }
}

#[test]
fn repository_rejects_connection_missing_required_table() {
    let mut conn = Connection::open_in_memory().unwrap();
    conn.execute_batch(&format!(
        "CREATE TABLE book (id INTEGER PRIMARY KEY, title TEXT NOT NULL);
         PRAGMA user_version = {};",
        latest_version()
    ))
    .unwrap();

    let result = SqliteBookRepository::try_new(&mut conn);
    assert!(matches!(result, Err(RepoError::MissingRequiredTable("section"))));
}

#[test]
fn repository_rejects_connection_missing_required_column() {
    let mut conn = Connection::open_in_memory().unwrap();
    conn.execute_batch(&format!(
        "CREATE TABLE book (id INTEGER PRIMARY KEY, title TEXT NOT NULL);
         CREATE TABLE section (id INTEGER PRIMARY KEY, title TEXT NOT NULL, book_id INTEGER);
         CREATE TABLE paragraph (id INTEGER PRIMARY KEY, section_id INTEGER, content TEXT);
         PRAGMA user_version = {};",
        latest_version()
    ))
    .unwrap();

    let result = SqliteBookRepository::try_new(&mut conn);
    assert!(matches!(
        result,
        Err(RepoError::MissingRequiredColumn {
            table: "section",
            column: "urn"
        })
    ));
}

#[test]
fn read_failure_surfaces_as_error_not_absence() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ccq.sqlite3");
    let mut conn = open_db(&path).unwrap();
    let repo = SqliteBookRepository::try_new(&mut conn).unwrap();

    let other = open_db(&path).unwrap();
    other.execute_batch("DROP TABLE paragraph;").unwrap();

    let err = repo.find_random_paragraph(u32::MAX).unwrap_err();
    assert!(matches!(err, RepoError::Db(_)), "unexpected error: {err}");
    let err = repo
        .find_random_paragraph_in_book("論語", u32::MAX)
        .unwrap_err();
    assert!(matches!(err, RepoError::Db(_)), "unexpected error: {err}");
}

#[test]
fn has_books_tracks_book_rows() {
    let mut conn = open_db_in_memory().unwrap();
    let mut repo = SqliteBookRepository::try_new(&mut conn).unwrap();

    assert!(!repo.has_books().unwrap());
    repo.save(&Book::new("空書", Vec::new())).unwrap();
    assert!(repo.has_books().unwrap());
    repo.delete_all().unwrap();
    assert!(!repo.has_books().unwrap());
}

#[test]
fn counts_track_all_tables() {
    let mut conn = open_db_in_memory().unwrap();
    let mut repo = SqliteBookRepository::try_new(&mut conn).unwrap();
    repo.replace_all(&[analects(), dao_de_jing()]).unwrap();

    assert_eq!(
        repo.counts().unwrap(),
        StoreCounts {
            books: 2,
            sections: 4,
            paragraphs: 5,
        }
    );
}

#[test]
fn paragraphs_reference_their_sections() {
    let mut conn = open_db_in_memory().unwrap();
    {
        let mut repo = SqliteBookRepository::try_new(&mut conn).unwrap();
        repo.replace_all(&[analects(), dao_de_jing()]).unwrap();
    }

    let orphans: i64 = conn
        .query_row(
            "SELECT COUNT(*)
             FROM paragraph p
             LEFT JOIN section s ON s.id = p.section_id
             LEFT JOIN book b ON b.id = s.book_id
             WHERE s.id IS NULL OR b.id IS NULL;",
            params![],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(orphans, 0);
}
