// Prompt constants for course generation.

/// Shape the model is asked to produce. Only `courseTitle` and `modules`
/// are enforced on the way back.
pub const COURSE_SCHEMA: &str = r#"{
  "courseTitle": "string - The title of the course",
  "modules": [
    {
      "moduleTitle": "string - Title of the module",
      "description": "string - Description of what the module covers",
      "lessons": [
        {
          "lessonTitle": "string - Title of the lesson",
          "content": "string - Detailed content/description of the lesson",
          "duration": "string - Estimated duration (e.g., '30 minutes')"
        }
      ],
      "quizzes": [
        {
          "question": "string - Quiz question",
          "options": ["string - Option A", "string - Option B", "string - Option C", "string - Option D"],
          "correctAnswer": "string - The correct option (e.g., 'A', 'B', 'C', or 'D')",
          "explanation": "string - Explanation of why this is the correct answer"
        }
      ]
    }
  ]
}"#;

/// Course prompt template. Replace `{user_prompt}` and `{schema}` before sending.
pub const COURSE_PROMPT_TEMPLATE: &str = r#"You are an expert course designer. Based on the following user request, create a comprehensive course outline.

User Request: {user_prompt}

Please generate a structured course outline that follows this exact JSON schema:
{schema}

Important:
1. Return ONLY valid JSON that matches the schema exactly
2. Do not include any markdown formatting or additional text
3. Ensure the course is practical, engaging, and well-structured
4. Include 3-5 modules with 2-4 lessons each
5. Include 1-2 quiz questions per module
6. Make the content realistic and actionable

Generate the course now:"#;

/// Builds the single instruction string sent to the model.
///
/// The user prompt is embedded verbatim. The schema is substituted first so
/// a user prompt containing `{schema}` is not expanded.
pub fn build_course_prompt(user_prompt: &str) -> String {
    COURSE_PROMPT_TEMPLATE
        .replace("{schema}", COURSE_SCHEMA)
        .replace("{user_prompt}", user_prompt)
}
