use super::format_chat_params;
use super::info_box;
use crate::domain::models::ChatParams;

#[test]
fn it_boxes_lines_of_different_width() {
    let res = info_box("Chat Session: qwen\nmlx_lm on port 8080");

    insta::assert_snapshot!(res, @r###"
    ╭─────────────────────╮
    │ Chat Session: qwen  │
    │ mlx_lm on port 8080 │
    ╰─────────────────────╯
    "###);
}

#[test]
fn it_formats_chat_params() {
    let res = format_chat_params(&ChatParams::default());

    insta::assert_snapshot!(res, @r###"
    Temperature: 0.70
    Max Tokens: 512
    Streaming: false
    "###);
}
