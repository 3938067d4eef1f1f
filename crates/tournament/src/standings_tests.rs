use super::*;

fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

fn order(rows: &[StandingRow]) -> Vec<&str> {
    rows.iter().map(|r| r.name.as_str()).collect()
}

#[test]
fn test_scores_and_counts() {
    let mut s = Standings::new(&names(&["a", "b"]), Tiebreak::HeadToHead);
    s.record("a", "b", Some(Outcome::WhiteWins));
    s.record("b", "a", Some(Outcome::Draw));
    s.record("a", "b", None);

    let rows = s.rows(&EloTracker::new());
    assert_eq!(order(&rows), vec!["a", "b"]);
    let a = &rows[0];
    assert_eq!((a.wins, a.draws, a.losses, a.incomplete), (1, 1, 0, 1));
    assert_eq!(a.score, 1.5);
    assert_eq!(rows[1].score, 0.5);
    assert_eq!(rows[1].incomplete, 1);
}

#[test]
fn test_head_to_head_breaks_tie() {
    // A cycle: every engine beats exactly one other.
    let mut s = Standings::new(&names(&["a", "b", "c"]), Tiebreak::HeadToHead);
    s.record("b", "a", Some(Outcome::WhiteWins));
    s.record("a", "c", Some(Outcome::WhiteWins));
    s.record("c", "b", Some(Outcome::WhiteWins));

    let rows = s.rows(&EloTracker::new());
    // All three are level on 1 point and each scored 1 inside the group,
    // so the name decides.
    assert_eq!(order(&rows), vec!["a", "b", "c"]);
    assert!(rows.iter().all(|r| r.rank == 1));

    let mut s = Standings::new(&names(&["a", "b", "c"]), Tiebreak::HeadToHead);
    s.record("b", "a", Some(Outcome::WhiteWins));
    s.record("a", "c", Some(Outcome::WhiteWins));
    s.record("b", "c", Some(Outcome::Draw));
    s.record("a", "c", Some(Outcome::Draw));
    // a: 1.5, b: 1.5, c: 1.0; b won the game between them.
    let rows = s.rows(&EloTracker::new());
    assert_eq!(order(&rows), vec!["b", "a", "c"]);
    assert_eq!(rows[0].tiebreak, 1.0);
    assert_eq!(rows[1].tiebreak, 0.0);
    assert_eq!((rows[0].rank, rows[1].rank, rows[2].rank), (1, 2, 3));
}

#[test]
fn test_sonneborn_berger() {
    let mut s = Standings::new(&names(&["a", "b", "c", "d"]), Tiebreak::SonnebornBerger);
    // a beats the strong c, b beats the weak d; both end on 1 point.
    s.record("a", "c", Some(Outcome::WhiteWins));
    s.record("b", "d", Some(Outcome::WhiteWins));
    s.record("c", "d", Some(Outcome::WhiteWins));
    s.record("c", "b", Some(Outcome::WhiteWins));
    s.record("d", "a", Some(Outcome::WhiteWins));

    let rows = s.rows(&EloTracker::new());
    let a = rows.iter().find(|r| r.name == "a").unwrap();
    let b = rows.iter().find(|r| r.name == "b").unwrap();
    assert_eq!(a.score, b.score);
    assert_eq!(a.tiebreak, 2.0);
    assert_eq!(b.tiebreak, 1.0);
    assert!(rows.iter().position(|r| r.name == "a") < rows.iter().position(|r| r.name == "b"));
}

#[test]
fn test_wins_tiebreak() {
    let mut s = Standings::new(&names(&["a", "b", "c"]), Tiebreak::Wins);
    s.record("a", "b", Some(Outcome::Draw));
    s.record("a", "c", Some(Outcome::Draw));
    s.record("b", "c", Some(Outcome::WhiteWins));
    s.record("c", "b", Some(Outcome::WhiteWins));
    s.record("b", "a", Some(Outcome::BlackWins));
    // a: 0.5+0.5+1 = 2 with 1 win; b: 0.5+1+0+0 = 1.5; c: 0.5+0+1 = 1.5.
    let rows = s.rows(&EloTracker::new());
    assert_eq!(rows[0].name, "a");
    assert_eq!(rows[0].tiebreak, 1.0);
    assert_eq!(order(&rows)[1..], ["b", "c"]);
    assert_eq!(rows[1].rank, rows[2].rank);
}

#[test]
fn test_elo_column_and_late_participants() {
    let mut s = Standings::new(&names(&["a"]), Tiebreak::default());
    let mut elo = EloTracker::new();
    elo.seed("a", 1900.0);
    s.record("a", "z", Some(Outcome::BlackWins));
    let rows = s.rows(&elo);
    assert_eq!(order(&rows), vec!["z", "a"]);
    assert_eq!(rows[1].elo, 1900.0);
    assert_eq!(s.games_recorded(), 1);
    assert_eq!(s.score("z"), 1.0);
}

#[test]
fn test_tiebreak_serde() {
    assert_eq!(serde_json::to_string(&Tiebreak::SonnebornBerger).unwrap(), "\"sonneborn_berger\"");
    let t: Tiebreak = serde_json::from_str("\"head_to_head\"").unwrap();
    assert_eq!(t, Tiebreak::HeadToHead);
}
