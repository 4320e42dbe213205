use aws_sdk_sesv2::types::{Body, Content, Destination, EmailContent, Message};
use aws_sdk_sesv2::Client as SesClient;

/// Send the enrollment notice for a freshly created account via AWS SES
pub async fn send_enrollment_email(
    ses_client: &SesClient,
    to_email: &str,
    first_name: &str,
    frontend_url: &str,
) -> Result<(), String> {
    let login_link = format!("{}/login", frontend_url);

    let html_body = format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <style>
        body {{
            font-family: 'HelveticaNeue', Helvetica, Arial, sans-serif;
            line-height: 1.6;
            color: #333333;
            background: #ffffff;
            margin: 0;
            padding: 0;
        }}
        .wrapper {{
            max-width: 600px;
            margin: 0 auto;
            padding: 60px 20px;
        }}
        .container {{
            background: #ffffff;
            border: 1px solid #e5e5e5;
            padding: 60px 50px;
        }}
        .logo {{
            font-size: 24px;
            font-weight: 300;
            color: #000000;
            margin: 0 0 40px 0;
            text-align: center;
            letter-spacing: -0.5px;
        }}
        .title {{
            font-size: 20px;
            font-weight: 300;
            color: #000000;
            margin: 0 0 24px 0;
        }}
        .text {{
            font-size: 15px;
            font-weight: 400;
            color: #333333;
            margin: 0 0 24px 0;
            line-height: 1.6;
        }}
        .button-wrapper {{
            text-align: center;
            margin: 32px 0;
        }}
        .button {{
            display: inline-block;
            width: 100%;
            max-width: 280px;
            padding: 18px 24px;
            background: #1c2d4f;
            color: #ffffff;
            text-decoration: none;
            font-weight: 400;
            font-size: 15px;
            text-align: center;
            box-sizing: border-box;
        }}
        .footer {{
            margin-top: 48px;
            padding-top: 24px;
            border-top: 1px solid #e5e5e5;
            font-size: 13px;
            font-weight: 300;
            color: #666666;
            text-align: center;
        }}
        @media only screen and (max-width: 600px) {{
            .container {{
                padding: 40px 24px;
            }}
            .wrapper {{
                padding: 40px 16px;
            }}
        }}
    </style>
</head>
<body>
    <div class="wrapper">
        <div class="container">
            <h1 class="logo">atlas</h1>

            <h2 class="title">Welcome, {}</h2>

            <p class="text">
                An observing account has been created for you on the atlas
                telescope queue. You now have a General observing program and
                can start submitting observations right away.
            </p>

            <div class="button-wrapper">
                <a href="{}" class="button">Sign In</a>
            </div>

            <p class="text" style="margin-top: 32px; font-size: 13px; color: #666666;">
                If you weren't expecting this account, you can safely ignore this email.
            </p>

            <div class="footer">
                <p>Clear skies</p>
            </div>
        </div>
    </div>
</body>
</html>"#,
        first_name, login_link
    );

    let text_body = format!(
        r#"atlas

Welcome, {}

An observing account has been created for you on the atlas telescope queue.
You now have a General observing program and can start submitting
observations right away.

Sign in: {}

If you weren't expecting this account, you can safely ignore this email.

Clear skies"#,
        first_name, login_link
    );

    let destination = Destination::builder()
        .to_addresses(to_email)
        .build();

    let subject = Content::builder()
        .data("Your atlas observing account")
        .charset("UTF-8")
        .build()
        .map_err(|e| format!("Failed to build subject: {:?}", e))?;

    let html_content = Content::builder()
        .data(html_body)
        .charset("UTF-8")
        .build()
        .map_err(|e| format!("Failed to build HTML content: {:?}", e))?;

    let text_content = Content::builder()
        .data(text_body)
        .charset("UTF-8")
        .build()
        .map_err(|e| format!("Failed to build text content: {:?}", e))?;

    let body = Body::builder()
        .html(html_content)
        .text(text_content)
        .build();

    let message = Message::builder()
        .subject(subject)
        .body(body)
        .build();

    let email_content = EmailContent::builder()
        .simple(message)
        .build();

    ses_client
        .send_email()
        .from_email_address("noreply@atlas-observatory.org")
        .destination(destination)
        .content(email_content)
        .send()
        .await
        .map_err(|e| format!("Failed to send email: {:?}", e))?;

    Ok(())
}
