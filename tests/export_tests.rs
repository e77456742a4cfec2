use tweetcsv::export::{write_csv, TweetRow};
use tweetcsv::twitter::AttachmentKind;

fn row(id: &str, media: AttachmentKind, text: &str) -> TweetRow {
    TweetRow {
        tweet_id: id.to_string(),
        created_at: "2023-01-15T10:30:00.000Z".to_string(),
        likes: 5,
        retweets: 2,
        replies: 1,
        quotes: 0,
        media,
        text: text.to_string(),
    }
}

#[test]
fn test_header_and_row_contents() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out.csv");

    let rows = vec![
        row("100", AttachmentKind::Media, "a photo"),
        row("99", AttachmentKind::Link, "see https://example.com"),
        row("98", AttachmentKind::None, "plain text"),
    ];

    let count = write_csv(&rows, &path).unwrap();
    pretty_assertions::assert_eq!(count, 3);

    let contents = std::fs::read_to_string(&path).unwrap();
    let first_line = contents.lines().next().unwrap();
    pretty_assertions::assert_eq!(
        first_line,
        "Tweet ID,Created At,Likes,Retweets,Replies,Quotes,Media,Tweet"
    );

    let mut reader = csv::Reader::from_path(&path).unwrap();
    let records: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
    pretty_assertions::assert_eq!(records.len(), 3);

    // Row order is preserved and the classification column is lowercase
    pretty_assertions::assert_eq!(&records[0][0], "100");
    pretty_assertions::assert_eq!(&records[0][6], "media");
    pretty_assertions::assert_eq!(&records[1][6], "link");
    pretty_assertions::assert_eq!(&records[2][6], "none");
    pretty_assertions::assert_eq!(&records[0][2], "5");
    pretty_assertions::assert_eq!(&records[0][7], "a photo");
}

#[test]
fn test_fields_with_delimiters_and_newlines_are_quoted() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out.csv");

    let tricky = "line one, with comma\nline two has \"quotes\"";
    let rows = vec![row("1", AttachmentKind::None, tricky)];

    write_csv(&rows, &path).unwrap();

    // The raw file must escape the field per standard CSV rules
    let contents = std::fs::read_to_string(&path).unwrap();
    assert!(contents.contains("\"line one, with comma\nline two has \"\"quotes\"\"\""));

    // And reading it back must round-trip the original text
    let mut reader = csv::Reader::from_path(&path).unwrap();
    let record = reader.records().next().unwrap().unwrap();
    pretty_assertions::assert_eq!(&record[7], tricky);
}

#[test]
fn test_existing_file_is_overwritten() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out.csv");

    let many = vec![
        row("1", AttachmentKind::None, "one"),
        row("2", AttachmentKind::None, "two"),
        row("3", AttachmentKind::None, "three"),
    ];
    write_csv(&many, &path).unwrap();

    let single = vec![row("9", AttachmentKind::Link, "only")];
    let count = write_csv(&single, &path).unwrap();
    pretty_assertions::assert_eq!(count, 1);

    let mut reader = csv::Reader::from_path(&path).unwrap();
    let records: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
    pretty_assertions::assert_eq!(records.len(), 1);
    pretty_assertions::assert_eq!(&records[0][0], "9");
}
