//! Property tests for record conversion and classification

use chrono::{TimeZone, Utc};
use proptest::prelude::*;

use subharvest::comments::to_comment;
use subharvest::models::{ContentKind, PostKind, RawComment, RawPost};
use subharvest::source::{classify, PostFlags};
use subharvest::submissions::to_submission;
use subharvest::utils::{approval_ratio, is_profile_community, strip_submission_prefix, submission_fullname};

fn raw_post(community: String) -> RawPost {
    RawPost {
        id: "abc".to_string(),
        title: "title".to_string(),
        author: None,
        created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).single().expect("valid date"),
        over_18: false,
        kind: ContentKind::Link,
        upvote_ratio: 0.5,
        total_awards: 0,
        num_crossposts: 0,
        selftext: String::new(),
        flair: None,
        community,
    }
}

fn flags() -> impl Strategy<Value = PostFlags> {
    (
        prop::option::of(prop_oneof![Just("image".to_string()), Just("link".to_string()), "[a-z:]{1,12}"]),
        any::<bool>(),
        any::<bool>(),
        any::<bool>(),
        any::<bool>(),
        prop::option::of(0u32..10_000),
    )
        .prop_map(|(post_hint, is_gallery, is_video, has_poll, is_self, video_duration)| PostFlags {
            post_hint,
            is_gallery,
            is_video,
            has_poll,
            is_self,
            video_duration,
        })
}

proptest! {
    #[test]
    fn profile_posts_never_become_submissions(user in "[A-Za-z0-9_-]{1,20}", slash in any::<bool>()) {
        let community = if slash { format!("u/{user}") } else { format!("u_{user}") };
        prop_assert!(is_profile_community(&community));
        prop_assert!(to_submission(&raw_post(community), true).is_none());
    }

    #[test]
    fn community_posts_keep_their_community(name in "[a-tv-z][A-Za-z0-9_]{1,20}") {
        let submission = to_submission(&raw_post(name.clone()), false);
        prop_assert!(submission.is_some());
        prop_assert_eq!(submission.map(|s| s.community_name), Some(name));
    }

    #[test]
    fn approval_ratio_stays_in_unit_range(ups in 0i64..1_000_000, downs in 0i64..1_000_000) {
        let ratio = approval_ratio(ups, downs);
        prop_assert!((0.0..=1.0).contains(&ratio));
        if ups + downs == 0 {
            prop_assert!(ratio.abs() < f64::EPSILON);
        }
    }

    #[test]
    fn comment_submission_id_is_unprefixed(id in "[a-z0-9]{1,10}", use_link in any::<bool>()) {
        let reference = format!("t3_{id}");
        let raw = RawComment {
            id: "c".to_string(),
            body: String::new(),
            author: None,
            created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).single().expect("valid date"),
            parent_id: if use_link { "t1_other".to_string() } else { reference.clone() },
            link_id: use_link.then(|| reference.clone()),
            ups: 0,
            downs: 0,
            stickied: false,
        };
        let comment = to_comment(&raw);
        prop_assert_eq!(&comment.submission_id, &id);
        prop_assert_eq!(comment.author, "None");
        prop_assert_eq!(submission_fullname(&comment.submission_id), reference.clone());
        prop_assert_eq!(strip_submission_prefix(&reference), id.as_str());
    }

    #[test]
    fn classification_follows_precedence(flags in flags()) {
        let kind = classify(&flags);
        let expected = if flags.post_hint.as_deref() == Some("image") {
            ContentKind::Image
        } else if flags.is_gallery {
            ContentKind::Gallery
        } else if flags.is_video {
            ContentKind::Video { duration_secs: flags.video_duration }
        } else if flags.has_poll {
            ContentKind::Poll
        } else if flags.is_self {
            ContentKind::Text
        } else {
            ContentKind::Link
        };
        prop_assert_eq!(kind, expected);
    }

    #[test]
    fn only_videos_carry_a_duration(flags in flags()) {
        let mut post = raw_post("rust".to_string());
        post.kind = classify(&flags);
        let submission = to_submission(&post, true).expect("community post");
        if submission.kind != PostKind::Video {
            prop_assert_eq!(submission.video_duration_seconds, 0);
        }
    }
}
